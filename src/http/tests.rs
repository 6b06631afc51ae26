//! Tests for the HTTP client module

use super::*;
use crate::auth::{AuthConfig, Authenticator, Credential};
use crate::error::Error;
use crate::types::BackoffType;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_client(base_url: &str, max_retries: u32) -> HttpClient {
    let config = HttpClientConfig::builder()
        .base_url(base_url)
        .max_retries(max_retries)
        .backoff(
            BackoffType::Constant,
            Duration::from_millis(5),
            Duration::from_millis(20),
        )
        .no_rate_limit()
        .build();
    HttpClient::new(config).unwrap()
}

#[test]
fn test_http_client_config_default() {
    let config = HttpClientConfig::default();
    assert_eq!(config.timeout, Duration::from_secs(30));
    assert_eq!(config.max_retries, 3);
    assert!(config.base_url.is_none());
    assert!(config.rate_limit.is_some());
    assert!(config.user_agent.starts_with("pipedrive-extract/"));
}

#[test]
fn test_http_client_config_builder() {
    let config = HttpClientConfig::builder()
        .base_url("https://api.pipedrive.com/v1/")
        .timeout(Duration::from_secs(60))
        .max_retries(5)
        .backoff(
            BackoffType::Linear,
            Duration::from_millis(200),
            Duration::from_secs(30),
        )
        .header("Accept", "application/json")
        .user_agent("test-agent/1.0")
        .build();

    assert_eq!(
        config.base_url.as_deref(),
        Some("https://api.pipedrive.com/v1/")
    );
    assert_eq!(config.timeout, Duration::from_secs(60));
    assert_eq!(config.max_retries, 5);
    assert_eq!(config.backoff_type, BackoffType::Linear);
    assert_eq!(
        config.default_headers.get("Accept").map(String::as_str),
        Some("application/json")
    );
    assert_eq!(config.user_agent, "test-agent/1.0");
}

#[test]
fn test_request_config_builder() {
    let config = RequestConfig::new()
        .query("start", "100")
        .query("limit", "100")
        .query("start", "200");

    let keys: Vec<_> = config.query.keys().cloned().collect();
    assert_eq!(keys, vec!["limit", "start"]);
    assert_eq!(config.query.get("start").map(String::as_str), Some("200"));
}

#[test]
fn test_backoff_calculation() {
    let client = |backoff: BackoffType| {
        HttpClient::new(
            HttpClientConfig::builder()
                .backoff(backoff, Duration::from_millis(100), Duration::from_secs(1))
                .no_rate_limit()
                .build(),
        )
        .unwrap()
    };

    let constant = client(BackoffType::Constant);
    assert!(!constant.has_rate_limiter());
    assert_eq!(constant.calculate_backoff(3), Duration::from_millis(100));

    let linear = client(BackoffType::Linear);
    assert_eq!(linear.calculate_backoff(0), Duration::from_millis(100));
    assert_eq!(linear.calculate_backoff(2), Duration::from_millis(300));

    let exponential = client(BackoffType::Exponential);
    assert_eq!(exponential.calculate_backoff(0), Duration::from_millis(100));
    assert_eq!(exponential.calculate_backoff(3), Duration::from_millis(800));
    assert_eq!(exponential.calculate_backoff(10), Duration::from_secs(1));
}

#[tokio::test]
async fn test_get_json_with_base_url_and_query() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/deals"))
        .and(query_param("limit", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [{"id": 1}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = fast_client(&format!("{}/v1/", server.uri()), 0);
    let body = client
        .get_json("deals", &RequestConfig::new().query("limit", "100"))
        .await
        .unwrap();

    assert_eq!(body["data"][0]["id"], 1);
}

#[tokio::test]
async fn test_retry_on_503_then_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let client = fast_client(&server.uri(), 3);
    let body = client.get_json("/flaky", &RequestConfig::new()).await.unwrap();
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn test_retries_exhausted_is_transient() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;

    let client = fast_client(&server.uri(), 2);
    let err = client
        .get_json("/down", &RequestConfig::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::TransientFetch { status: Some(502), .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_uncommon_server_errors_are_transient() {
    let server = MockServer::start().await;

    for (route, status) in [("/version", 505), ("/storage", 507)] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status))
            .expect(1)
            .mount(&server)
            .await;
    }

    let client = fast_client(&server.uri(), 0);
    for (route, status) in [("/version", 505), ("/storage", 507)] {
        let err = client
            .get_json(route, &RequestConfig::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::FailureKind::Transient);
        assert!(matches!(err, Error::TransientFetch { status: Some(s), .. } if s == status));
    }
}

#[tokio::test]
async fn test_429_uses_retry_after() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let client = fast_client(&server.uri(), 1);
    let body = client
        .get_json("/limited", &RequestConfig::new())
        .await
        .unwrap();
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_401_is_fatal_and_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/deals"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "success": false,
            "error": "unauthorized access"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = fast_client(&server.uri(), 3);
    let err = client
        .get_json("/deals", &RequestConfig::new())
        .await
        .unwrap_err();

    match err {
        Error::FatalFetch { status, message } => {
            assert_eq!(status, 401);
            assert!(message.contains("unauthorized access"));
        }
        other => panic!("expected fatal error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_non_json_body_is_data_shape() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let client = fast_client(&server.uri(), 0);
    let err = client
        .get_json("/html", &RequestConfig::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DataShape { .. }));
}

#[tokio::test]
async fn test_connection_refused_is_transient() {
    // Bind then drop a listener so the port is very likely closed.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let client = fast_client(&format!("http://127.0.0.1:{port}"), 1);
    let err = client
        .get_json("/anything", &RequestConfig::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TransientFetch { status: None, .. }));
}

#[tokio::test]
async fn test_client_applies_auth() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/currencies"))
        .and(query_param("api_token", "secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(1)
        .mount(&server)
        .await;

    let auth = Authenticator::new(
        AuthConfig::default(),
        Some(Credential::new("secret-token").unwrap()),
    )
    .unwrap();
    let config = HttpClientConfig::builder()
        .base_url(server.uri())
        .no_rate_limit()
        .build();
    let client = HttpClient::with_auth(config, auth).unwrap();

    client
        .get_json("currencies", &RequestConfig::new())
        .await
        .unwrap();

    let debug = format!("{client:?}");
    assert!(!debug.contains("secret-token"));
}

#[tokio::test]
async fn test_transport_error_does_not_leak_query_credential() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let auth = Authenticator::new(
        AuthConfig::default(),
        Some(Credential::new("secret-token").unwrap()),
    )
    .unwrap();
    let config = HttpClientConfig::builder()
        .base_url(format!("http://127.0.0.1:{port}"))
        .max_retries(0)
        .no_rate_limit()
        .build();
    let client = HttpClient::with_auth(config, auth).unwrap();

    let err = client
        .get_json("deals", &RequestConfig::new())
        .await
        .unwrap_err();
    assert!(!err.to_string().contains("secret-token"));
}
