//! Mastodon REST client
//!
//! This module handles the HTTP side of a scan, including:
//! - Building HTTP clients with a contactable user agent string
//! - OAuth password-grant authentication
//! - Paginated follower/following listings
//! - Mapping non-success responses to status-carrying errors

use crate::api::{
    ApiAccount, ApiError, ApiResult, Relation, RelationshipFetcher, RemoteAccount, TokenResponse,
};
use crate::config::UserAgentConfig;
use crate::storage::Instance;
use async_trait::async_trait;
use reqwest::header::LINK;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

/// Default number of entries requested per listing page
const DEFAULT_PAGE_LIMIT: u32 = 80;

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use fedi_ripple::config::UserAgentConfig;
/// use fedi_ripple::api::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "FediRipple".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL; ContactEmail)
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Extracts the `rel="next"` target from a `Link` response header
///
/// ```
/// use fedi_ripple::api::parse_next_link;
///
/// let header = r#"<https://a.example/api/v1/accounts/1/followers?max_id=7>; rel="next", <https://a.example/api/v1/accounts/1/followers?min_id=9>; rel="prev""#;
/// assert_eq!(
///     parse_next_link(header).unwrap().as_str(),
///     "https://a.example/api/v1/accounts/1/followers?max_id=7"
/// );
/// ```
pub fn parse_next_link(header: &str) -> Option<Url> {
    header.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let is_next = pieces.any(|param| {
            let param = param.trim();
            param == "rel=\"next\"" || param == "rel=next"
        });
        if !is_next {
            return None;
        }
        let target = target.strip_prefix('<')?.strip_suffix('>')?;
        Url::parse(target).ok()
    })
}

/// Client for one Mastodon-compatible instance
#[derive(Debug, Clone)]
pub struct MastodonClient {
    http: Client,
    base_url: Url,
    client_id: String,
    client_secret: String,
    access_token: Option<String>,
    page_limit: u32,
    max_pages: u32,
}

impl MastodonClient {
    /// Creates a client for the API rooted at `base_url`
    pub fn new(
        http: Client,
        base_url: Url,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            access_token: None,
            page_limit: DEFAULT_PAGE_LIMIT,
            max_pages: 1,
        }
    }

    /// Creates a client for `https://<domain>` using the instance's API application
    pub fn for_instance(http: Client, instance: &Instance) -> ApiResult<Self> {
        let base_url = Url::parse(&format!("https://{}/", instance.domain))?;
        Ok(Self::new(
            http,
            base_url,
            instance.client_id.clone().unwrap_or_default(),
            instance.client_secret.clone().unwrap_or_default(),
        ))
    }

    /// Sets the page size and the number of pages followed per listing
    pub fn with_paging(mut self, page_limit: u32, max_pages: u32) -> Self {
        self.page_limit = page_limit.max(1);
        self.max_pages = max_pages.max(1);
        self
    }

    /// Whether the last authentication attempt produced a token
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    fn endpoint(&self, path: &str) -> ApiResult<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Fetches every page of one relation, up to `max_pages`
    async fn list(&self, relation: Relation, account_id: u64) -> ApiResult<Vec<RemoteAccount>> {
        let mut url = self.endpoint(&format!(
            "api/v1/accounts/{}/{}",
            account_id,
            relation.path_segment()
        ))?;
        url.query_pairs_mut()
            .append_pair("limit", &self.page_limit.to_string());

        let mut accounts = Vec::new();
        let mut next = Some(url);
        let mut pages = 0;

        while let Some(url) = next.take() {
            if pages >= self.max_pages {
                break;
            }
            pages += 1;

            let endpoint = url.path().to_string();
            let mut request = self.http.get(url);
            if let Some(token) = &self.access_token {
                request = request.bearer_auth(token);
            }

            let response = request.send().await.map_err(|source| ApiError::Transport {
                endpoint: endpoint.clone(),
                source,
            })?;
            let response = check_status(response, &endpoint)?;

            next = response
                .headers()
                .get(LINK)
                .and_then(|value| value.to_str().ok())
                .and_then(parse_next_link)
                .filter(|link| {
                    let same_origin = link.origin() == self.base_url.origin();
                    if !same_origin {
                        tracing::warn!("Ignoring {} page link to another origin: {}", relation, link);
                    }
                    same_origin
                });

            let page: Vec<ApiAccount> = decode(response, &endpoint).await?;
            for entry in page {
                match RemoteAccount::try_from(entry) {
                    Ok(account) => accounts.push(account),
                    Err(entry) => tracing::debug!(
                        "Skipping {} entry with non-numeric id '{}' ({})",
                        relation,
                        entry.id,
                        entry.acct
                    ),
                }
            }
        }

        Ok(accounts)
    }
}

#[async_trait]
impl RelationshipFetcher for MastodonClient {
    async fn authenticate(&mut self, username: &str, password: &str) -> ApiResult<()> {
        self.access_token = None;

        let url = self.endpoint("oauth/token")?;
        let endpoint = url.path().to_string();
        let form = [
            ("grant_type", "password"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("username", username),
            ("password", password),
            ("scope", "read"),
        ];

        let response = self
            .http
            .post(url)
            .form(&form)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                endpoint: endpoint.clone(),
                source,
            })?;
        let response = check_status(response, &endpoint)?;
        let token: TokenResponse = decode(response, &endpoint).await?;

        self.access_token = Some(token.access_token);
        Ok(())
    }

    async fn followers(&self, account_id: u64) -> ApiResult<Vec<RemoteAccount>> {
        self.list(Relation::Followers, account_id).await
    }

    async fn following(&self, account_id: u64) -> ApiResult<Vec<RemoteAccount>> {
        self.list(Relation::Following, account_id).await
    }
}

fn check_status(response: Response, endpoint: &str) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ApiError::Status {
            status: status.as_u16(),
            endpoint: endpoint.to_string(),
        })
    }
}

async fn decode<T: DeserializeOwned>(response: Response, endpoint: &str) -> ApiResult<T> {
    let body = response.text().await.map_err(|source| ApiError::Transport {
        endpoint: endpoint.to_string(),
        source,
    })?;
    serde_json::from_str(&body).map_err(|source| ApiError::Decode {
        endpoint: endpoint.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_config() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestScanner".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }

    fn client_for(server: &MockServer) -> MastodonClient {
        MastodonClient::new(
            build_http_client(&create_test_config()).unwrap(),
            Url::parse(&server.uri()).unwrap(),
            "app-id",
            "app-secret",
        )
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&create_test_config()).is_ok());
    }

    #[test]
    fn test_for_instance_uses_https() {
        let instance = Instance::with_credentials("a.example", "id", "secret", "u", "p");
        let client = MastodonClient::for_instance(Client::new(), &instance).unwrap();
        assert_eq!(client.base_url.as_str(), "https://a.example/");
        assert!(!client.is_authenticated());
    }

    #[test]
    fn test_parse_next_link() {
        assert!(parse_next_link(r#"<https://a.example/x?min_id=1>; rel="prev""#).is_none());
        assert!(parse_next_link("").is_none());
        assert_eq!(
            parse_next_link("<https://a.example/x?max_id=3>; rel=next")
                .unwrap()
                .as_str(),
            "https://a.example/x?max_id=3"
        );
    }

    #[tokio::test]
    async fn test_authenticate_stores_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("grant_type=password"))
            .and(body_string_contains("client_id=app-id"))
            .and(body_string_contains("username=scanner"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access_token": "tok", "token_type": "Bearer"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut client = client_for(&server);
        client.authenticate("scanner", "pw").await.unwrap();
        assert!(client.is_authenticated());
    }

    #[tokio::test]
    async fn test_failed_authentication_clears_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok"})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let mut client = client_for(&server);
        client.authenticate("scanner", "pw").await.unwrap();
        let err = client.authenticate("scanner", "pw").await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert!(!client.is_authenticated());
    }

    #[tokio::test]
    async fn test_followers_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/accounts/7/followers"))
            .and(header("authorization", "Bearer tok"))
            .and(query_param("limit", "80"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "11", "acct": "bob"},
                {"id": "12", "acct": "alice@b.example"},
                {"id": "not-a-number", "acct": "weird"}
            ])))
            .mount(&server)
            .await;

        let mut client = client_for(&server);
        client.authenticate("scanner", "pw").await.unwrap();
        let followers = client.followers(7).await.unwrap();

        assert_eq!(
            followers,
            vec![
                RemoteAccount::new(11, "bob"),
                RemoteAccount::new(12, "alice@b.example")
            ]
        );
    }

    #[tokio::test]
    async fn test_error_status_is_preserved() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/accounts/9/following"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/accounts/10/following"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(client.following(9).await.unwrap_err().status(), Some(404));
        assert_eq!(client.following(10).await.unwrap_err().status(), Some(429));
    }

    #[tokio::test]
    async fn test_invalid_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/accounts/1/followers"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.followers(1).await.unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));
        assert_eq!(err.status(), None);
    }

    #[tokio::test]
    async fn test_pagination_follows_next_link_up_to_max_pages() {
        let server = MockServer::start().await;
        let page2 = format!("{}/api/v1/accounts/1/followers?max_id=20", server.uri());
        let page3 = format!("{}/api/v1/accounts/1/followers?max_id=10", server.uri());

        Mock::given(method("GET"))
            .and(path("/api/v1/accounts/1/followers"))
            .and(query_param("max_id", "20"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("link", format!("<{}>; rel=\"next\"", page3).as_str())
                    .set_body_json(json!([{"id": "2", "acct": "two"}])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/accounts/1/followers"))
            .and(query_param("max_id", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "3", "acct": "three"}])))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/accounts/1/followers"))
            .and(query_param("limit", "2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("link", format!("<{}>; rel=\"next\"", page2).as_str())
                    .set_body_json(json!([{"id": "1", "acct": "one"}])),
            )
            .mount(&server)
            .await;

        let client = client_for(&server).with_paging(2, 2);
        let followers = client.followers(1).await.unwrap();

        assert_eq!(
            followers,
            vec![RemoteAccount::new(1, "one"), RemoteAccount::new(2, "two")]
        );
    }

    #[tokio::test]
    async fn test_next_link_to_another_origin_is_not_followed() {
        let server = MockServer::start().await;
        let elsewhere = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "9", "acct": "nine"}])))
            .expect(0)
            .mount(&elsewhere)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/accounts/1/followers"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(
                        "link",
                        format!(
                            "<{}/api/v1/accounts/1/followers?max_id=5>; rel=\"next\"",
                            elsewhere.uri()
                        )
                        .as_str(),
                    )
                    .set_body_json(json!([{"id": "1", "acct": "one"}])),
            )
            .mount(&server)
            .await;

        let client = client_for(&server).with_paging(2, 3);
        let followers = client.followers(1).await.unwrap();

        assert_eq!(followers, vec![RemoteAccount::new(1, "one")]);
    }
}
