use crate::api::{ApiResult, Relation, RemoteAccount};
use async_trait::async_trait;

/// Relationship source for one instance
///
/// Implementations authenticate once per scan cycle and then list the
/// followers and followings of instance-local account identifiers.
#[async_trait]
pub trait RelationshipFetcher: Send + Sync {
    /// Obtains a fresh access token with the service account's credentials
    async fn authenticate(&mut self, username: &str, password: &str) -> ApiResult<()>;

    /// Lists the followers of an account
    async fn followers(&self, account_id: u64) -> ApiResult<Vec<RemoteAccount>>;

    /// Lists the accounts an account follows
    async fn following(&self, account_id: u64) -> ApiResult<Vec<RemoteAccount>>;

    /// Lists one relation of an account
    async fn relation(&self, relation: Relation, account_id: u64) -> ApiResult<Vec<RemoteAccount>> {
        match relation {
            Relation::Followers => self.followers(account_id).await,
            Relation::Following => self.following(account_id).await,
        }
    }
}
