//! Integration tests for the scanner
//!
//! These tests use wiremock to stand in for Mastodon instances and run
//! real scan cycles against an on-disk SQLite database.

use fedi_ripple::api::{build_http_client, MastodonClient};
use fedi_ripple::config::{FailurePolicy, InstanceEntry, UserAgentConfig};
use fedi_ripple::identity::HttpAccountLookup;
use fedi_ripple::scanner::{
    provision_instances, seed_accounts, ErrorKind, InstanceWorker, WorkerSettings,
};
use fedi_ripple::storage::{Instance, SqliteStorage, Storage};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// `host:port` of a mock server, used as its instance domain
fn domain_of(server: &MockServer) -> String {
    let url = Url::parse(&server.uri()).expect("mock server uri");
    format!(
        "{}:{}",
        url.host_str().expect("mock server host"),
        url.port().expect("mock server port")
    )
}

fn user_agent() -> UserAgentConfig {
    UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    }
}

fn entry(domain: &str, seeds: &[&str]) -> InstanceEntry {
    InstanceEntry {
        domain: domain.to_string(),
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        username: "scanner@example.com".to_string(),
        password: "hunter2".to_string(),
        seeds: seeds.iter().map(|s| s.to_string()).collect(),
    }
}

async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok",
            "token_type": "Bearer",
            "scope": "read"
        })))
        .mount(server)
        .await;
}

async fn mount_lookup(server: &MockServer, username: &str, id: &str) {
    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/lookup"))
        .and(query_param("acct", username))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": id,
            "acct": username
        })))
        .mount(server)
        .await;
}

async fn mount_listing(server: &MockServer, id: u64, relation: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(format!("/api/v1/accounts/{}/{}", id, relation)))
        .and(header("authorization", "Bearer tok"))
        .respond_with(response)
        .mount(server)
        .await;
}

/// A provisioned home instance with its seeds planted
struct Setup {
    _dir: TempDir,
    storage: Arc<SqliteStorage>,
    instance: Instance,
    worker: InstanceWorker,
}

async fn setup(home: &MockServer, seeds: &[&str]) -> Setup {
    let dir = TempDir::new().expect("temp dir");
    let storage = Arc::new(SqliteStorage::new(&dir.path().join("fedi.db")).expect("database"));
    let http = build_http_client(&user_agent()).expect("http client");
    let lookup = Arc::new(HttpAccountLookup::insecure(http.clone()));

    let domain = domain_of(home);
    let mut instances =
        provision_instances(&[entry(&domain, seeds)], storage.as_ref()).expect("provisioning");
    let instance = instances.remove(0);

    let seed_list: Vec<String> = seeds.iter().map(|s| s.to_string()).collect();
    seed_accounts(&instance, &seed_list, lookup.as_ref(), storage.as_ref()).await;

    let client = MastodonClient::new(
        http,
        Url::parse(&home.uri()).expect("base url"),
        "client",
        "secret",
    )
    .with_paging(80, 1);

    let worker = InstanceWorker::new(
        instance.clone(),
        Box::new(client),
        lookup,
        storage.clone(),
        WorkerSettings {
            cycle_interval: Duration::from_secs(360),
            transient_pause: Duration::ZERO,
            failure_policy: FailurePolicy::Classified,
        },
    );

    Setup {
        _dir: dir,
        storage,
        instance,
        worker,
    }
}

#[tokio::test]
async fn test_full_cycle_records_local_and_foreign_accounts() {
    let home = MockServer::start().await;
    let foreign = MockServer::start().await;
    let foreign_domain = domain_of(&foreign);

    mount_token(&home).await;
    mount_lookup(&home, "owner", "1").await;
    mount_lookup(&foreign, "alice", "77").await;
    mount_listing(
        &home,
        1,
        "followers",
        ResponseTemplate::new(200).set_body_json(json!([
            { "id": "2", "acct": "bob" },
            { "id": "3", "acct": format!("alice@{}", foreign_domain) }
        ])),
    )
    .await;
    mount_listing(
        &home,
        1,
        "following",
        ResponseTemplate::new(200).set_body_json(json!([
            { "id": "2", "acct": "bob" }
        ])),
    )
    .await;

    let mut s = setup(&home, &["owner"]).await;
    let report = s.worker.run_cycle().await;

    assert!(report.authenticated);
    assert_eq!(report.selected, 1);
    assert_eq!(report.saved, 1);
    assert_eq!(report.abandoned, None);

    let owner = s
        .storage
        .get_account("owner", &s.instance.domain)
        .unwrap()
        .expect("owner stored");
    assert_eq!(owner.id, Some(1));
    assert_eq!(owner.local_followers, 1);
    assert_eq!(owner.remote_followers, 1);
    assert_eq!(owner.local_followings, 1);
    assert_eq!(owner.remote_followings, 0);
    assert!(owner.last_scan.is_some());

    let bob = s
        .storage
        .get_account("bob", &s.instance.domain)
        .unwrap()
        .expect("bob stored");
    assert_eq!(bob.id, Some(2));

    let alice = s
        .storage
        .get_account("alice", &foreign_domain)
        .unwrap()
        .expect("alice stored");
    assert_eq!(alice.id, Some(77));
    assert!(s.storage.get_instance(&foreign_domain).unwrap().is_some());

    // the home instance keeps its provisioned credentials
    assert!(s
        .storage
        .get_instance(&s.instance.domain)
        .unwrap()
        .expect("home instance")
        .has_credentials());

    // bob is now due for his own scan
    let due = s.storage.find_accounts_to_scan(&s.instance).unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].username, "bob");
}

#[tokio::test]
async fn test_not_found_account_is_removed() {
    let home = MockServer::start().await;
    mount_token(&home).await;
    mount_lookup(&home, "gone", "5").await;
    mount_listing(&home, 5, "followers", ResponseTemplate::new(404)).await;

    let mut s = setup(&home, &["gone"]).await;
    let report = s.worker.run_cycle().await;

    assert_eq!(report.removed, 1);
    assert!(s
        .storage
        .get_account("gone", &s.instance.domain)
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_rate_limit_abandons_remaining_accounts() {
    let home = MockServer::start().await;
    mount_token(&home).await;
    mount_lookup(&home, "first", "1").await;
    mount_lookup(&home, "second", "2").await;
    mount_listing(&home, 1, "followers", ResponseTemplate::new(429)).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/2/followers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&home)
        .await;

    let mut s = setup(&home, &["first", "second"]).await;
    let report = s.worker.run_cycle().await;

    assert_eq!(report.selected, 2);
    assert_eq!(report.abandoned, Some(ErrorKind::RateLimited));
    assert_eq!(report.saved, 0);
    assert_eq!(s.storage.count_scanned_accounts(None).unwrap(), 0);
}

#[tokio::test]
async fn test_server_error_leaves_account_for_next_cycle() {
    let home = MockServer::start().await;
    mount_token(&home).await;
    mount_lookup(&home, "owner", "1").await;
    mount_listing(&home, 1, "followers", ResponseTemplate::new(502)).await;
    mount_listing(
        &home,
        1,
        "following",
        ResponseTemplate::new(200).set_body_json(json!([
            { "id": "4", "acct": "dave" }
        ])),
    )
    .await;

    let mut s = setup(&home, &["owner"]).await;
    let report = s.worker.run_cycle().await;

    assert_eq!(report.incomplete, 1);
    assert_eq!(report.abandoned, None);

    let owner = s
        .storage
        .get_account("owner", &s.instance.domain)
        .unwrap()
        .expect("owner stored");
    assert!(owner.last_scan.is_none());
    assert!(s
        .storage
        .get_account("dave", &s.instance.domain)
        .unwrap()
        .is_some());

    // still due on the next cycle
    let again = s.worker.run_cycle().await;
    assert!(again.selected >= 1);
}
