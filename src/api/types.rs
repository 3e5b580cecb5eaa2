use serde::Deserialize;
use std::fmt;

/// Account entity as returned by the Mastodon REST API
///
/// Only the fields the scanner needs are decoded.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiAccount {
    /// Instance-local identifier (a decimal string on the wire)
    pub id: String,

    /// Handle relative to the answering instance: `user` or `user@domain`
    pub acct: String,
}

/// A follower/following entry reduced to what the scan loop consumes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAccount {
    /// Identifier local to the instance that returned the listing
    pub id: u64,

    /// Handle relative to that instance
    pub acct: String,
}

impl RemoteAccount {
    pub fn new(id: u64, acct: impl Into<String>) -> Self {
        Self {
            id,
            acct: acct.into(),
        }
    }
}

impl TryFrom<ApiAccount> for RemoteAccount {
    type Error = ApiAccount;

    fn try_from(account: ApiAccount) -> Result<Self, Self::Error> {
        match account.id.parse() {
            Ok(id) => Ok(Self {
                id,
                acct: account.acct,
            }),
            Err(_) => Err(account),
        }
    }
}

/// OAuth token endpoint response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

/// The two relationship listings scanned for every account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Followers,
    Following,
}

impl Relation {
    /// Both relations, in scan order
    pub const ALL: [Relation; 2] = [Relation::Followers, Relation::Following];

    /// Path segment of the listing endpoint
    pub fn path_segment(&self) -> &'static str {
        match self {
            Self::Followers => "followers",
            Self::Following => "following",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}
