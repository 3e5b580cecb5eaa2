//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.
//! The connection sits behind a mutex that is held for exactly one storage
//! call, so a single `SqliteStorage` can be shared by every instance worker.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{Account, Instance};
use crate::FediError;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Default age after which a scanned account becomes eligible again
const DEFAULT_RESCAN_AFTER: Duration = Duration::from_secs(24 * 60 * 60);

/// Default maximum number of accounts returned per selection
const DEFAULT_BATCH_SIZE: u32 = 200;

const ACCOUNT_COLUMNS: &str = "account_id, username, instance, local_followers, remote_followers,
     local_followings, remote_followings, last_scan";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Mutex<Connection>,
    rescan_after: Duration,
    batch_size: u32,
}

impl SqliteStorage {
    /// Opens (or creates) the database at `path`
    pub fn new(path: &Path) -> Result<Self, FediError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self::from_connection(conn))
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, FediError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            rescan_after: DEFAULT_RESCAN_AFTER,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Sets the selection policy used by `find_accounts_to_scan`
    ///
    /// Accounts whose last scan is younger than `rescan_after` are not
    /// selected; at most `batch_size` accounts are returned per call.
    pub fn with_selection(mut self, rescan_after: Duration, batch_size: u32) -> Self {
        self.rescan_after = rescan_after;
        self.batch_size = batch_size;
        self
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    // Fixed-width UTC form so that text comparison orders chronologically
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|at| at.with_timezone(&Utc))
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get::<_, Option<i64>>(0)?.map(|id| id as u64),
        username: row.get(1)?,
        instance: row.get(2)?,
        local_followers: row.get(3)?,
        remote_followers: row.get(4)?,
        local_followings: row.get(5)?,
        remote_followings: row.get(6)?,
        last_scan: parse_timestamp(row.get(7)?),
    })
}

fn instance_from_row(row: &Row<'_>) -> rusqlite::Result<Instance> {
    Ok(Instance {
        domain: row.get(0)?,
        client_id: row.get(1)?,
        client_secret: row.get(2)?,
        username: row.get(3)?,
        password: row.get(4)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Scan Loop =====

    fn find_accounts_to_scan(&self, instance: &Instance) -> StorageResult<Vec<Account>> {
        let rescan_after = chrono::Duration::from_std(self.rescan_after)
            .map_err(|e| StorageError::Selection(format!("rescan interval: {}", e)))?;
        let cutoff = timestamp(Utc::now() - rescan_after);

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM accounts
             WHERE instance = ?1
               AND account_id IS NOT NULL
               AND (last_scan IS NULL OR last_scan < ?2)
             ORDER BY last_scan IS NOT NULL, last_scan, account_id
             LIMIT ?3",
            ACCOUNT_COLUMNS
        ))?;

        let accounts = stmt
            .query_map(
                params![instance.domain, cutoff, self.batch_size],
                account_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(accounts)
    }

    fn save_account(&self, account: &Account) -> StorageResult<()> {
        let now = timestamp(Utc::now());
        self.conn()?.execute(
            "INSERT INTO accounts
             (username, instance, account_id, local_followers, remote_followers,
              local_followings, remote_followings, last_scan, discovered_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(username, instance) DO UPDATE SET
                account_id = COALESCE(accounts.account_id, excluded.account_id),
                local_followers = excluded.local_followers,
                remote_followers = excluded.remote_followers,
                local_followings = excluded.local_followings,
                remote_followings = excluded.remote_followings,
                last_scan = excluded.last_scan",
            params![
                account.username,
                account.instance,
                account.id.map(|id| id as i64),
                account.local_followers,
                account.remote_followers,
                account.local_followings,
                account.remote_followings,
                account.last_scan.map(timestamp),
                now,
            ],
        )?;
        Ok(())
    }

    fn remove_account(&self, account: &Account) -> StorageResult<()> {
        self.conn()?.execute(
            "DELETE FROM accounts WHERE username = ?1 AND instance = ?2",
            params![account.username, account.instance],
        )?;
        Ok(())
    }

    fn create_account_if_not_exist(&self, account: &Account) -> StorageResult<bool> {
        let now = timestamp(Utc::now());
        let created = self.conn()?.execute(
            "INSERT OR IGNORE INTO accounts (username, instance, account_id, discovered_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                account.username,
                account.instance,
                account.id.map(|id| id as i64),
                now
            ],
        )?;
        Ok(created == 1)
    }

    fn create_instance_if_not_exist(&self, instance: &Instance) -> StorageResult<bool> {
        let now = timestamp(Utc::now());
        let created = self.conn()?.execute(
            "INSERT OR IGNORE INTO instances
             (domain, client_id, client_secret, username, password, discovered_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                instance.domain,
                instance.client_id,
                instance.client_secret,
                instance.username,
                instance.password,
                now
            ],
        )?;
        Ok(created == 1)
    }

    // ===== Provisioning =====

    fn upsert_instance(&self, instance: &Instance) -> StorageResult<()> {
        let now = timestamp(Utc::now());
        self.conn()?.execute(
            "INSERT INTO instances
             (domain, client_id, client_secret, username, password, discovered_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(domain) DO UPDATE SET
                client_id = excluded.client_id,
                client_secret = excluded.client_secret,
                username = excluded.username,
                password = excluded.password",
            params![
                instance.domain,
                instance.client_id,
                instance.client_secret,
                instance.username,
                instance.password,
                now
            ],
        )?;
        Ok(())
    }

    fn get_instance(&self, domain: &str) -> StorageResult<Option<Instance>> {
        let instance = self
            .conn()?
            .query_row(
                "SELECT domain, client_id, client_secret, username, password
                 FROM instances WHERE domain = ?1",
                params![domain],
                instance_from_row,
            )
            .optional()?;
        Ok(instance)
    }

    fn get_account(&self, username: &str, instance: &str) -> StorageResult<Option<Account>> {
        let account = self
            .conn()?
            .query_row(
                &format!(
                    "SELECT {} FROM accounts WHERE username = ?1 AND instance = ?2",
                    ACCOUNT_COLUMNS
                ),
                params![username, instance],
                account_from_row,
            )
            .optional()?;
        Ok(account)
    }

    // ===== Statistics =====

    fn list_instances(&self) -> StorageResult<Vec<Instance>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT domain, client_id, client_secret, username, password
             FROM instances ORDER BY domain",
        )?;
        let instances = stmt
            .query_map([], instance_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(instances)
    }

    fn count_instances(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM instances", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_accounts(&self, instance: Option<&str>) -> StorageResult<u64> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM accounts WHERE ?1 IS NULL OR instance = ?1",
            params![instance],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_scanned_accounts(&self, instance: Option<&str>) -> StorageResult<u64> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM accounts
             WHERE last_scan IS NOT NULL AND (?1 IS NULL OR instance = ?1)",
            params![instance],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
