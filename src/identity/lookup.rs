//! Foreign account identifier lookup
//!
//! Account identifiers are only meaningful on the instance that hosts the
//! account, so accounts discovered on another instance are looked up there
//! through `GET /api/v1/accounts/lookup?acct=<username>`.

use crate::api::ApiAccount;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use url::Url;

/// Errors raised while resolving an account on its home instance
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Instance {domain} is unreachable: {source}")]
    Unreachable {
        domain: String,
        source: reqwest::Error,
    },

    #[error("Account {username}@{domain} is unknown")]
    UnknownAccount { username: String, domain: String },

    #[error("Lookup on {domain} failed with HTTP {status}")]
    Status { domain: String, status: u16 },

    #[error("Instance {domain} returned an unreadable account: {source}")]
    Decode {
        domain: String,
        source: serde_json::Error,
    },

    #[error("Instance {domain} returned a non-numeric account id '{id}'")]
    InvalidId { domain: String, id: String },

    #[error("Invalid lookup URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Result type for account lookups
pub type LookupResult<T> = Result<T, LookupError>;

/// Resolves the instance-local identifier of an account hosted on another instance
#[async_trait]
pub trait AccountLookup: Send + Sync {
    async fn resolve_foreign_account_id(
        &self,
        username: &str,
        instance_domain: &str,
    ) -> LookupResult<u64>;
}

/// Account lookup against the public Mastodon REST API
#[derive(Debug, Clone)]
pub struct HttpAccountLookup {
    client: Client,
    scheme: &'static str,
}

impl HttpAccountLookup {
    /// Creates a lookup that talks HTTPS to every instance
    pub fn new(client: Client) -> Self {
        Self {
            client,
            scheme: "https",
        }
    }

    /// Creates a lookup that talks plain HTTP (local test instances only)
    pub fn insecure(client: Client) -> Self {
        Self {
            client,
            scheme: "http",
        }
    }

    fn lookup_url(&self, username: &str, instance_domain: &str) -> LookupResult<Url> {
        let mut url = Url::parse(&format!(
            "{}://{}/api/v1/accounts/lookup",
            self.scheme, instance_domain
        ))?;
        url.query_pairs_mut().append_pair("acct", username);
        Ok(url)
    }
}

#[async_trait]
impl AccountLookup for HttpAccountLookup {
    async fn resolve_foreign_account_id(
        &self,
        username: &str,
        instance_domain: &str,
    ) -> LookupResult<u64> {
        let url = self.lookup_url(username, instance_domain)?;
        let unreachable = |source| LookupError::Unreachable {
            domain: instance_domain.to_string(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(unreachable)?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(LookupError::UnknownAccount {
                    username: username.to_string(),
                    domain: instance_domain.to_string(),
                })
            }
            status if !status.is_success() => {
                return Err(LookupError::Status {
                    domain: instance_domain.to_string(),
                    status: status.as_u16(),
                })
            }
            _ => {}
        }

        let body = response.text().await.map_err(unreachable)?;
        let account: ApiAccount =
            serde_json::from_str(&body).map_err(|source| LookupError::Decode {
                domain: instance_domain.to_string(),
                source,
            })?;
        account.id.parse().map_err(|_| LookupError::InvalidId {
            domain: instance_domain.to_string(),
            id: account.id,
        })
    }
}
