//! Storage module for persisting discovered accounts and instances
//!
//! This module handles all database operations for the scanner, including:
//! - SQLite database initialization and schema management
//! - Create-if-absent recording of discovered accounts and instances
//! - Selection of accounts due for a scan
//! - Instance credential provisioning

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use chrono::{DateTime, Utc};

/// A federation server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    /// Domain name, unique key
    pub domain: String,
    /// OAuth application client id
    pub client_id: Option<String>,
    /// OAuth application client secret
    pub client_secret: Option<String>,
    /// Login of the scanning service account
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Instance {
    /// An instance known only by its domain, as recorded on discovery
    pub fn discovered(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            client_id: None,
            client_secret: None,
            username: None,
            password: None,
        }
    }

    /// An instance with a registered API application and service account
    pub fn with_credentials(
        domain: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            client_id: Some(client_id.into()),
            client_secret: Some(client_secret.into()),
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    /// Service account login, if both parts are provisioned
    pub fn login(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some((username.as_str(), password.as_str())),
            _ => None,
        }
    }

    /// Whether the instance can be scanned with an authenticated client
    pub fn has_credentials(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some() && self.login().is_some()
    }
}

/// An account hosted on some instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Identifier local to `instance`; `None` until it has been resolved
    pub id: Option<u64>,
    pub username: String,
    /// Domain of the hosting instance
    pub instance: String,
    pub local_followers: u32,
    pub remote_followers: u32,
    pub local_followings: u32,
    pub remote_followings: u32,
    /// Time of the last complete scan
    pub last_scan: Option<DateTime<Utc>>,
}

impl Account {
    /// A freshly observed account with zeroed counters
    pub fn new(id: Option<u64>, username: impl Into<String>, instance: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            instance: instance.into(),
            local_followers: 0,
            remote_followers: 0,
            local_followings: 0,
            remote_followings: 0,
            last_scan: None,
        }
    }

    /// The `user@domain` form of this account
    pub fn handle(&self) -> String {
        format!("{}@{}", self.username, self.instance)
    }
}
