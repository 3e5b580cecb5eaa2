use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Fedi-Ripple
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "instance")]
    pub instances: Vec<InstanceEntry>,
}

/// How a worker reacts to a failed relationship fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Abandon the cycle on 401/429, drop accounts on 404, pause otherwise
    #[default]
    Classified,
    /// Treat every failure as transient: pause and keep going
    Retry,
}

/// Scan loop behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Pause between two scan cycles of one instance (seconds)
    #[serde(rename = "cycle-interval-secs")]
    pub cycle_interval_secs: u64,

    /// Pause after a transient fetch failure (milliseconds)
    #[serde(rename = "transient-pause-ms")]
    pub transient_pause_ms: u64,

    /// Minimum age of an account's last scan before it is selected again (seconds)
    #[serde(rename = "rescan-after-secs")]
    pub rescan_after_secs: u64,

    /// Maximum number of accounts selected per cycle
    #[serde(rename = "batch-size")]
    pub batch_size: u32,

    /// Number of accounts requested per relationship page
    #[serde(rename = "page-limit")]
    pub page_limit: u32,

    /// Maximum number of relationship pages followed per fetch
    #[serde(rename = "max-pages")]
    pub max_pages: u32,

    #[serde(rename = "failure-policy")]
    pub failure_policy: FailurePolicy,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: 360,
            transient_pause_ms: 2000,
            rescan_after_secs: 86_400,
            batch_size: 200,
            page_limit: 80,
            max_pages: 1,
            failure_policy: FailurePolicy::Classified,
        }
    }
}

impl ScannerConfig {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs)
    }

    pub fn transient_pause(&self) -> Duration {
        Duration::from_millis(self.transient_pause_ms)
    }

    pub fn rescan_after(&self) -> Duration {
        Duration::from_secs(self.rescan_after_secs)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// A target instance with the credentials of its scanning service account
#[derive(Debug, Clone, Deserialize)]
pub struct InstanceEntry {
    /// Instance domain (e.g., "mastodon.social")
    pub domain: String,

    #[serde(rename = "client-id")]
    pub client_id: String,

    #[serde(rename = "client-secret")]
    pub client_secret: String,

    /// Login of the service account (usually an email address)
    pub username: String,

    pub password: String,

    /// Handles of accounts to start from
    #[serde(default)]
    pub seeds: Vec<String>,
}
