//! Federation API access
//!
//! This module contains everything that talks to a Mastodon-compatible
//! instance on behalf of a worker:
//! - The `RelationshipFetcher` contract the scan loop depends on
//! - `MastodonClient`, its reqwest implementation (OAuth password grant,
//!   paginated follower/following listings)
//! - Typed API errors that carry the HTTP status when there is one

mod client;
mod error;
mod traits;
mod types;

pub use client::{build_http_client, parse_next_link, MastodonClient};
pub use error::{status_from_message, ApiError, ApiResult};
pub use traits::RelationshipFetcher;
pub use types::{ApiAccount, Relation, RemoteAccount, TokenResponse};
