//! End-to-end tests for the client against a mock API server.
//!
//! These tests verify that the client:
//! - Renews a rejected token and retries exactly once
//! - Reports both failures when the renewal itself fails
//! - Leaves requests that need no credential untouched
//! - Enforces the per-call deadline across renewal and retry

use std::sync::Arc;
use std::time::Duration;

use wecred_client::{ClientError, WeChatClient};
use wecred_core::{
    AccessToken, AppCredentials, Cache, CacheCodec, CredentialError, CredentialManager,
    MemoryCache,
};
use wiremock::matchers::{
    body_json, header, method, path, query_param, query_param_is_missing,
};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const APP_ID: &str = "wx-app";

/// Helper to build a client pointed at the mock server.
fn client(server: &MockServer, cache: Arc<dyn Cache>) -> WeChatClient {
    WeChatClient::builder(AppCredentials::new(APP_ID, "app-secret"))
        .base_api_url(server.uri())
        .access_token_url(format!("{}/cgi-bin/token", server.uri()))
        .cache(cache)
        .build()
        .unwrap()
}

/// Helper to seed the cache with a token the server will reject.
async fn seed_token(cache: &Arc<dyn Cache>, value: &str) {
    let token = AccessToken::new(value, 7200);
    cache
        .set(APP_ID, "access-token", &token.encode().unwrap(), 7200)
        .await
        .unwrap();
}

fn ok_json(body: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

async fn requests_to(server: &MockServer, route: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == route)
        .collect()
}

async fn mount_token_endpoint(server: &MockServer, token: &str) {
    Mock::given(method("GET"))
        .and(path("/cgi-bin/token"))
        .and(query_param("grant_type", "client_credential"))
        .and(query_param("appid", APP_ID))
        .and(query_param("secret", "app-secret"))
        .respond_with(ok_json(serde_json::json!({
            "access_token": token,
            "expires_in": 7200
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_rejected_token_is_renewed_and_retried_once() {
    let server = MockServer::start().await;
    let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
    seed_token(&cache, "invalid").await;

    Mock::given(method("GET"))
        .and(path("/cgi-bin/user/info"))
        .and(query_param("access_token", "invalid"))
        .respond_with(ok_json(serde_json::json!({
            "errcode": 40014,
            "errmsg": "invalid access_token"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/user/info"))
        .and(query_param("access_token", "valid-token"))
        .respond_with(ok_json(serde_json::json!({"openid": "o1"})))
        .mount(&server)
        .await;
    mount_token_endpoint(&server, "valid-token").await;

    let client = client(&server, cache.clone());
    let response = client.get("/cgi-bin/user/info", true).await.unwrap();

    let body: serde_json::Value = response.json().unwrap();
    assert_eq!(body["openid"], "o1");

    let calls = requests_to(&server, "/cgi-bin/user/info").await;
    assert_eq!(calls.len(), 2);
    assert!(calls[1].url.query().unwrap().contains("access_token=valid-token"));
    assert_eq!(requests_to(&server, "/cgi-bin/token").await.len(), 1);

    // The renewed token replaced the rejected one in the cache
    let cached = AccessToken::decode(&cache.get(APP_ID, "access-token").await.unwrap()).unwrap();
    assert_eq!(cached.value(), "valid-token");
}

#[tokio::test]
async fn test_failed_renewal_reports_both_errors() {
    let server = MockServer::start().await;
    let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
    seed_token(&cache, "invalid").await;

    Mock::given(method("GET"))
        .and(path("/cgi-bin/user/info"))
        .respond_with(ok_json(serde_json::json!({
            "errcode": 40014,
            "errmsg": "invalid access_token"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/token"))
        .respond_with(ok_json(serde_json::json!({
            "errcode": 40125,
            "errmsg": "invalid appsecret"
        })))
        .mount(&server)
        .await;

    let client = client(&server, cache);
    let err = client.get("/cgi-bin/user/info", true).await.unwrap_err();

    match &err {
        ClientError::RetryFailed { primary, retry } => {
            assert_eq!(primary.code, 40014);
            assert_eq!(retry.api_code(), Some(40125));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let message = err.to_string();
    assert!(message.contains("40014"));
    assert!(message.contains("40125"));

    let received = server.received_requests().await.unwrap_or_default();
    assert_eq!(received.len(), 2);
    assert_eq!(received[1].url.path(), "/cgi-bin/token");
}

#[tokio::test]
async fn test_token_is_fetched_once_and_reused() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "shared-token").await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/menu/get"))
        .and(query_param("access_token", "shared-token"))
        .respond_with(ok_json(serde_json::json!({"errcode": 0, "errmsg": "ok"})))
        .expect(3)
        .mount(&server)
        .await;

    let client = client(&server, Arc::new(MemoryCache::new()));
    for _ in 0..3 {
        client.get("/cgi-bin/menu/get", true).await.unwrap();
    }

    assert_eq!(requests_to(&server, "/cgi-bin/token").await.len(), 1);
}

#[tokio::test]
async fn test_uncredentialed_request_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sns/jscode2session"))
        .and(query_param_is_missing("access_token"))
        .respond_with(ok_json(serde_json::json!({
            "errcode": 40014,
            "errmsg": "invalid access_token"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, Arc::new(MemoryCache::new()));
    let err = client
        .get("/sns/jscode2session?js_code=abc", false)
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Api(ref api) if api.code == 40014));
    assert!(requests_to(&server, "/cgi-bin/token").await.is_empty());
}

#[tokio::test]
async fn test_post_json_sends_json_body() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "post-token").await;
    Mock::given(method("POST"))
        .and(path("/cgi-bin/message/custom/send"))
        .and(query_param("access_token", "post-token"))
        .and(header("content-type", "application/json"))
        .and(body_json(serde_json::json!({"touser": "o1", "msgtype": "text"})))
        .respond_with(ok_json(serde_json::json!({"errcode": 0, "errmsg": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, Arc::new(MemoryCache::new()));
    client
        .post_json(
            "/cgi-bin/message/custom/send",
            &serde_json::json!({"touser": "o1", "msgtype": "text"}),
            true,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_non_success_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/broken"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = client(&server, Arc::new(MemoryCache::new()));
    let err = client.get("/cgi-bin/broken", false).await.unwrap_err();

    assert!(matches!(err, ClientError::Status { status: 503 }));
}

#[tokio::test]
async fn test_absolute_target_bypasses_base_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/elsewhere"))
        .respond_with(ResponseTemplate::new(200).set_body_string("plain"))
        .expect(1)
        .mount(&server)
        .await;

    let client = WeChatClient::builder(AppCredentials::new(APP_ID, "app-secret"))
        .base_api_url("https://api.weixin.qq.com")
        .build()
        .unwrap();

    let response = client
        .get(&format!("{}/elsewhere", server.uri()), false)
        .await
        .unwrap();
    assert_eq!(response.text(), "plain");
}

#[tokio::test]
async fn test_deadline_bounds_the_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let client = WeChatClient::builder(AppCredentials::new(APP_ID, "app-secret"))
        .base_api_url(server.uri())
        .request_timeout(Duration::from_secs(1))
        .build()
        .unwrap();

    let err = client.get("/cgi-bin/slow", false).await.unwrap_err();
    assert!(matches!(err, ClientError::Timeout));
}

fn client_with_timeout(server: &MockServer, cache: Arc<dyn Cache>, timeout: Duration) -> WeChatClient {
    WeChatClient::builder(AppCredentials::new(APP_ID, "app-secret"))
        .base_api_url(server.uri())
        .access_token_url(format!("{}/cgi-bin/token", server.uri()))
        .cache(cache)
        .request_timeout(timeout)
        .build()
        .unwrap()
}

async fn mount_rejection(server: &MockServer, route: &str, token: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .and(query_param("access_token", token))
        .respond_with(ok_json(serde_json::json!({
            "errcode": 40014,
            "errmsg": "invalid access_token"
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_slow_renewal_stays_within_deadline() {
    let server = MockServer::start().await;
    let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
    seed_token(&cache, "invalid").await;

    mount_rejection(&server, "/cgi-bin/user/info", "invalid").await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/token"))
        .respond_with(
            ok_json(serde_json::json!({"access_token": "valid-token", "expires_in": 7200}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let client = client_with_timeout(&server, cache, Duration::from_secs(1));
    let started = std::time::Instant::now();
    let err = client.get("/cgi-bin/user/info", true).await.unwrap_err();

    assert!(matches!(err, ClientError::Timeout), "unexpected error: {err:?}");
    assert!(started.elapsed() < Duration::from_millis(2500));
    assert_eq!(requests_to(&server, "/cgi-bin/user/info").await.len(), 1);
}

#[tokio::test]
async fn test_slow_retry_stays_within_deadline() {
    let server = MockServer::start().await;
    let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
    seed_token(&cache, "invalid").await;

    mount_rejection(&server, "/cgi-bin/user/info", "invalid").await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/user/info"))
        .and(query_param("access_token", "valid-token"))
        .respond_with(ok_json(serde_json::json!({"openid": "o1"})).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;
    mount_token_endpoint(&server, "valid-token").await;

    let client = client_with_timeout(&server, cache, Duration::from_secs(1));
    let started = std::time::Instant::now();
    let err = client.get("/cgi-bin/user/info", true).await.unwrap_err();

    assert!(matches!(err, ClientError::Timeout), "unexpected error: {err:?}");
    assert!(started.elapsed() < Duration::from_millis(2500));
    assert_eq!(requests_to(&server, "/cgi-bin/token").await.len(), 1);
}

#[tokio::test]
async fn test_access_token_pass_throughs() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "raw-token").await;

    let client = client(&server, Arc::new(MemoryCache::new()));

    let first = client.get_access_token().await.unwrap();
    assert_eq!(first.credential().value(), "raw-token");
    client.get_access_token().await.unwrap();
    assert_eq!(requests_to(&server, "/cgi-bin/token").await.len(), 1);

    client.fetch_access_token().await.unwrap();
    assert_eq!(requests_to(&server, "/cgi-bin/token").await.len(), 2);
}

#[tokio::test]
async fn test_missing_cache_degrades_persistence() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "uncached").await;

    let client = WeChatClient::builder(AppCredentials::new(APP_ID, "app-secret"))
        .base_api_url(server.uri())
        .access_token_url(format!("{}/cgi-bin/token", server.uri()))
        .build()
        .unwrap();

    let issued = client.get_access_token().await.unwrap();
    assert_eq!(issued.credential().value(), "uncached");
    assert!(matches!(
        issued.persist_error(),
        Some(CredentialError::CacheNotConfigured)
    ));
}

#[tokio::test]
async fn test_js_ticket_is_fetched_with_token_and_cached() {
    let server = MockServer::start().await;
    let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
    mount_token_endpoint(&server, "ticket-token").await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/ticket/getticket"))
        .and(query_param("type", "jsapi"))
        .and(query_param("access_token", "ticket-token"))
        .respond_with(ok_json(serde_json::json!({
            "errcode": 0,
            "errmsg": "ok",
            "ticket": "bxLdikRXVbTPdHSM05e5u5sUoXNKd8",
            "expires_in": 7200
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, cache.clone());
    let tickets = client.js_ticket_manager();

    let ticket = tickets.get().await.unwrap().into_inner();
    assert_eq!(ticket.value(), "bxLdikRXVbTPdHSM05e5u5sUoXNKd8");

    let again = tickets.get().await.unwrap().into_inner();
    assert_eq!(again.value(), ticket.value());
    assert!(cache.get(APP_ID, "js-ticket").await.is_ok());
    assert!(cache.get(APP_ID, "access-token").await.is_ok());
}

#[tokio::test]
async fn test_third_party_platform_flow() {
    let server = MockServer::start().await;
    let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());

    Mock::given(method("POST"))
        .and(path("/cgi-bin/component/api_component_token"))
        .and(body_json(serde_json::json!({
            "component_appid": "component-app",
            "component_appsecret": "component-secret",
            "component_verify_ticket": "ticket@@@pushed"
        })))
        .respond_with(ok_json(serde_json::json!({
            "component_access_token": "component-token",
            "expires_in": 7200
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/cgi-bin/component/api_create_preauthcode"))
        .and(query_param("component_access_token", "component-token"))
        .respond_with(ok_json(serde_json::json!({
            "pre_auth_code": "code",
            "expires_in": 600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = WeChatClient::third_party_platform(
        AppCredentials::new("component-app", "component-secret"),
        cache,
    )
    .base_api_url(server.uri())
    .component_token_url(format!(
        "{}/cgi-bin/component/api_component_token",
        server.uri()
    ))
    .build()
    .unwrap();

    // No ticket pushed yet
    let err = client.get_access_token().await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Credential(CredentialError::MissingTicket)
    ));

    let tickets = client.verify_tickets().unwrap();
    tickets.set("ticket@@@pushed".to_string()).await.unwrap();

    let response = client
        .post_json(
            "/cgi-bin/component/api_create_preauthcode",
            &serde_json::json!({"component_appid": "component-app"}),
            true,
        )
        .await
        .unwrap();
    let body: serde_json::Value = response.json().unwrap();
    assert_eq!(body["pre_auth_code"], "code");
}
