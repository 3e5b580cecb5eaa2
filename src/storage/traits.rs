//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{Account, Instance};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage connection poisoned by a panicking writer")]
    Poisoned,

    #[error("Invalid selection policy: {0}")]
    Selection(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Every method takes `&self`: one backend is shared by all instance
/// workers, so implementations must be safe under concurrent calls and
/// create-if-absent operations must be atomic.
pub trait Storage: Send + Sync {
    // ===== Scan Loop =====

    /// Accounts of `instance` that are due for a scan, in scan order
    fn find_accounts_to_scan(&self, instance: &Instance) -> StorageResult<Vec<Account>>;

    /// Stores the counters and scan time of an existing account
    fn save_account(&self, account: &Account) -> StorageResult<()>;

    /// Deletes an account (matched on username and instance)
    fn remove_account(&self, account: &Account) -> StorageResult<()>;

    /// Records an account unless one with the same username and instance exists
    ///
    /// Never overwrites an existing record. Returns whether a record was created.
    fn create_account_if_not_exist(&self, account: &Account) -> StorageResult<bool>;

    /// Records an instance unless one with the same domain exists
    ///
    /// Returns whether a record was created.
    fn create_instance_if_not_exist(&self, instance: &Instance) -> StorageResult<bool>;

    // ===== Provisioning =====

    /// Inserts an instance or replaces the credentials of an existing one
    fn upsert_instance(&self, instance: &Instance) -> StorageResult<()>;

    /// Gets an instance by domain
    fn get_instance(&self, domain: &str) -> StorageResult<Option<Instance>>;

    /// Gets an account by username and instance domain
    fn get_account(&self, username: &str, instance: &str) -> StorageResult<Option<Account>>;

    // ===== Statistics =====

    /// All known instances, ordered by domain
    fn list_instances(&self) -> StorageResult<Vec<Instance>>;

    fn count_instances(&self) -> StorageResult<u64>;

    /// Counts accounts, optionally restricted to one instance
    fn count_accounts(&self, instance: Option<&str>) -> StorageResult<u64>;

    /// Counts accounts that have completed at least one scan
    fn count_scanned_accounts(&self, instance: Option<&str>) -> StorageResult<u64>;
}
