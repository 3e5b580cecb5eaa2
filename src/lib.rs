//! Fedi-Ripple: a polite federated social-graph explorer
//!
//! This crate walks the follower/following graph of Mastodon-compatible
//! instances, one worker per instance, and records every account and
//! instance it discovers along the way.

pub mod api;
pub mod config;
pub mod identity;
pub mod output;
pub mod scanner;
pub mod storage;

use thiserror::Error;

/// Main error type for Fedi-Ripple operations
#[derive(Debug, Error)]
pub enum FediError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("API error: {0}")]
    Api(#[from] api::ApiError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid instance domain: {0}")]
    InvalidDomain(String),
}

/// Handle parsing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandleError {
    #[error("Malformed handle '{handle}': {reason}")]
    Malformed { handle: String, reason: &'static str },
}

/// Result type alias for Fedi-Ripple operations
pub type Result<T> = std::result::Result<T, FediError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use identity::resolve;
pub use scanner::{classify, ErrorKind, InstanceWorker};
pub use storage::{Account, Instance};
