//! Integration tests using wiremock to simulate HTTP servers.

use safe_fetch::retry::retry_fn;
use safe_fetch::{
    Backoff, Body, Client, ErrorKind, NormalizedError, ParseAs, RequestOptions, SafeResult,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct TestData {
    id: u32,
    name: String,
}

fn test_data(id: u32, name: &str) -> TestData {
    TestData {
        id,
        name: name.to_string(),
    }
}

fn client_for(server: &MockServer) -> Client {
    Client::builder()
        .base_url(server.uri())
        .unwrap()
        .build()
        .unwrap()
}

/// Counts requests and fails the first `failures` of them with `status`.
fn flaky(
    counter: Arc<AtomicUsize>,
    failures: usize,
    status: u16,
    ok_body: TestData,
) -> impl Fn(&wiremock::Request) -> ResponseTemplate + Send + Sync {
    move |_req: &wiremock::Request| {
        let count = counter.fetch_add(1, Ordering::SeqCst);
        if count < failures {
            ResponseTemplate::new(status).set_body_string("Server error")
        } else {
            ResponseTemplate::new(200).set_body_json(&ok_body)
        }
    }
}

#[tokio::test]
async fn test_successful_get_request() {
    let mock_server = MockServer::start().await;
    let response_data = test_data(1, "Test");

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&response_data))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let response = client
        .get::<TestData>("/test", RequestOptions::new())
        .await
        .ok()
        .unwrap();

    assert_eq!(response.data, response_data);
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.attempts, 1);
    assert!(!response.was_retried());
}

#[tokio::test]
async fn test_successful_post_request() {
    let mock_server = MockServer::start().await;
    let request_data = test_data(0, "New");
    let response_data = test_data(1, "New");

    Mock::given(method("POST"))
        .and(path("/test"))
        .and(header("content-type", "application/json"))
        .and(body_json(&request_data))
        .respond_with(ResponseTemplate::new(201).set_body_json(&response_data))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let response = client
        .post::<TestData, _>("/test", &request_data, RequestOptions::new())
        .await
        .ok()
        .unwrap();

    assert_eq!(response.data, response_data);
    assert_eq!(response.status().as_u16(), 201);
}

#[tokio::test]
async fn test_http_error_4xx() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(serde_json::json!({ "error": "not found" })),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client.get::<TestData>("/missing", RequestOptions::new()).await;

    let failure = result.into_result().unwrap_err();
    assert_eq!(failure.kind(), ErrorKind::Http);
    assert_eq!(failure.error.message(), "HTTP 404 Not Found");
    assert_eq!(failure.response.as_ref().unwrap().status.as_u16(), 404);
    match &failure.error {
        NormalizedError::Http { status, body, .. } => {
            assert_eq!(status.as_u16(), 404);
            let body = body.as_ref().and_then(Body::as_json).unwrap();
            assert_eq!(body["error"], "not found");
        }
        other => panic!("Expected Http error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_json_is_http_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{ not json"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client.get::<TestData>("/test", RequestOptions::new()).await;

    let error = result.error().unwrap();
    assert_eq!(error.kind(), ErrorKind::Http);
    assert_eq!(error.message(), "Failed to parse response body");
    assert_eq!(error.status().map(|s| s.as_u16()), Some(200));
    assert!(error.cause().is_some());
    assert!(result.response().is_some());
}

#[tokio::test]
async fn test_type_mismatch_is_validation_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "x" })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client.get::<TestData>("/test", RequestOptions::new()).await;

    assert_eq!(result.error().unwrap().kind(), ErrorKind::Validation);
    assert!(result.response().is_some());
}

#[tokio::test]
async fn test_retry_on_5xx() {
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));

    // First two requests fail with 500, third succeeds
    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(flaky(attempt_count.clone(), 2, 500, test_data(1, "Test")))
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .retry_strategy(Backoff::new(3).base_delay(Duration::from_millis(10)))
        .build()
        .unwrap();

    let response = client
        .get::<TestData>("/test", RequestOptions::new())
        .await
        .ok()
        .unwrap();

    assert_eq!(response.data.id, 1);
    assert_eq!(response.attempts, 3);
    assert!(response.was_retried());
    assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retries_exhausted_reports_last_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .retry_strategy(Backoff::new(2).base_delay(Duration::from_millis(5)))
        .build()
        .unwrap();

    let result = client.get::<TestData>("/test", RequestOptions::new()).await;

    // 2 retries means 3 total attempts
    assert_eq!(result.attempts(), 3);
    let error = result.error().unwrap();
    assert_eq!(error.kind(), ErrorKind::Http);
    assert_eq!(error.status().map(|s| s.as_u16()), Some(503));
    match error {
        NormalizedError::Http { body, .. } => {
            assert_eq!(body.as_ref().and_then(Body::as_text), Some("unavailable"));
        }
        other => panic!("Expected Http error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_retry_on_429_for_get() {
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let counter = attempt_count.clone();

    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(move |_req: &wiremock::Request| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                ResponseTemplate::new(429).insert_header("Retry-After", "0")
            } else {
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true }))
            }
        })
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client
        .get::<serde_json::Value>("/limited", RequestOptions::new().retries(Backoff::new(1)))
        .await;

    assert_eq!(result.data().unwrap()["ok"], true);
    assert_eq!(result.attempts(), 2);
    assert_eq!(attempt_count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_post_is_not_retried_by_default() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .retry_strategy(Backoff::new(3).base_delay(Duration::from_millis(5)))
        .build()
        .unwrap();

    let result = client
        .post::<TestData, _>("/test", &test_data(0, "x"), RequestOptions::new())
        .await;

    assert_eq!(result.attempts(), 1);
    assert_eq!(result.error().unwrap().kind(), ErrorKind::Http);
}

#[tokio::test]
async fn test_custom_retry_predicate() {
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));

    Mock::given(method("POST"))
        .and(path("/test"))
        .respond_with(flaky(attempt_count.clone(), 1, 502, test_data(2, "Retried")))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);

    // The predicate replaces the GET/HEAD rule entirely
    let strategy = Backoff::new(2)
        .base_delay(Duration::from_millis(5))
        .retry_on(retry_fn(|ctx| ctx.status().is_some_and(|s| s.as_u16() == 502)));

    let result = client
        .post::<TestData, _>(
            "/test",
            &test_data(0, "x"),
            RequestOptions::new().retries(strategy),
        )
        .await;

    assert_eq!(result.data(), Some(&test_data(2, "Retried")));
    assert_eq!(attempt_count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .retry_strategy(Backoff::new(3).base_delay(Duration::from_millis(5)))
        .build()
        .unwrap();

    let result = client.get::<TestData>("/test", RequestOptions::new()).await;
    assert_eq!(result.attempts(), 1);
    assert_eq!(result.error().unwrap().message(), "HTTP 400 Bad Request");
}

#[tokio::test]
async fn test_query_parameters() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/items"))
        .and(query_param("page", "1"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<TestData>::new()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let options = RequestOptions::new()
        .query("page", 1)
        .query("limit", 10)
        .query_opt("cursor", None::<String>);
    let response = client
        .get::<Vec<TestData>>("/items", options)
        .await
        .ok()
        .unwrap();

    assert!(response.data.is_empty());
    assert_eq!(response.raw.url.query(), Some("page=1&limit=10"));
}

#[tokio::test]
async fn test_default_query_and_headers_are_overridable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .and(header("authorization", "Bearer call"))
        .and(header("x-app", "tests"))
        .and(query_param("lang", "de"))
        .respond_with(ResponseTemplate::new(200).set_body_json(test_data(1, "Test")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .default_header("Authorization", "Bearer default")
        .unwrap()
        .default_header("X-App", "tests")
        .unwrap()
        .default_query("lang", "en")
        .build()
        .unwrap();

    let options = RequestOptions::new()
        .header("Authorization", "Bearer call")
        .unwrap()
        .query("lang", "de");
    let result = client.get::<TestData>("/test", options).await;

    assert!(result.is_ok(), "{:?}", result.error());
}

#[tokio::test]
async fn test_validator_transforms_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(test_data(9, "Ada")))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let options = RequestOptions::<String>::new().validate_with(|body| {
        let name = body
            .as_json()
            .and_then(|v| v["name"].as_str())
            .ok_or("missing name")?;
        Ok(name.to_uppercase())
    });

    let result = client.get::<String>("/test", options).await;
    assert_eq!(result.data().map(String::as_str), Some("ADA"));
}

#[tokio::test]
async fn test_validator_rejection() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": 1 })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let options = RequestOptions::<String>::new().validate_with(|body| {
        body.as_json()
            .and_then(|v| v["name"].as_str())
            .map(str::to_string)
            .ok_or_else(|| "name is required".into())
    });

    let result = client.get::<String>("/test", options).await;

    let error = result.error().unwrap();
    assert_eq!(error.kind(), ErrorKind::Validation);
    assert_eq!(error.message(), "Validation failed");
    assert_eq!(error.cause().unwrap().to_string(), "name is required");
    assert_eq!(result.response().unwrap().status.as_u16(), 200);
}

#[tokio::test]
async fn test_parse_as_text_and_bytes() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/plain"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);

    let text = client
        .get::<String>("/plain", RequestOptions::new().parse_as(ParseAs::Text))
        .await;
    assert_eq!(text.data().map(String::as_str), Some("hello"));

    let bytes = client
        .get::<bytes::Bytes>("/plain", RequestOptions::new().parse_as(ParseAs::Bytes))
        .await;
    assert_eq!(bytes.data().map(|b| b.as_ref()), Some(b"hello".as_slice()));
}

#[tokio::test]
async fn test_no_content_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/test/1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client.delete::<()>("/test/1", RequestOptions::new()).await;

    assert!(result.is_ok());
    assert_eq!(result.response().unwrap().status.as_u16(), 204);
}

#[tokio::test]
async fn test_all_http_methods() {
    let mock_server = MockServer::start().await;
    let data = test_data(1, "Test");

    for verb in ["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD"] {
        Mock::given(method(verb))
            .and(path("/test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&data))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let client = client_for(&mock_server);

    assert!(client.get::<TestData>("/test", RequestOptions::new()).await.is_ok());
    assert!(client
        .post::<TestData, _>("/test", &data, RequestOptions::new())
        .await
        .is_ok());
    assert!(client
        .put::<TestData, _>("/test", &data, RequestOptions::new())
        .await
        .is_ok());
    assert!(client
        .patch::<TestData, _>("/test", &data, RequestOptions::new())
        .await
        .is_ok());
    assert!(client.delete::<TestData>("/test", RequestOptions::new()).await.is_ok());

    let head = client
        .head::<()>("/test", RequestOptions::new().parse_as(ParseAs::Response))
        .await;
    assert!(head.is_ok());
}

#[tokio::test]
async fn test_network_failure() {
    // Nothing listens on port 1
    let client = Client::builder()
        .base_url("http://127.0.0.1:1")
        .unwrap()
        .build()
        .unwrap();

    let result = client.get::<TestData>("/test", RequestOptions::new()).await;

    match result {
        SafeResult::Failure(failure) => {
            assert_eq!(failure.kind(), ErrorKind::Network);
            assert_eq!(failure.error.message(), "Network request failed");
            assert!(failure.error.cause().is_some());
            assert!(failure.response.is_none());
            assert_eq!(failure.attempts, 1);
        }
        SafeResult::Success(_) => panic!("Expected a network failure"),
    }
}

#[tokio::test]
async fn test_attempt_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(test_data(1, "Slow"))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .timeout(Duration::from_millis(50))
        .build()
        .unwrap();

    let result = client.get::<TestData>("/slow", RequestOptions::new()).await;

    let error = result.error().unwrap();
    assert_eq!(error.kind(), ErrorKind::Timeout);
    assert_eq!(error.message(), "Request timed out after 50 ms");
    assert!(result.response().is_none());
}

#[tokio::test]
async fn test_repeated_calls_are_identical() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .and(query_param("lang", "en"))
        .respond_with(ResponseTemplate::new(200).set_body_json(test_data(3, "Same")))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .default_query("lang", "en")
        .build()
        .unwrap();

    let first = client.get::<TestData>("/test", RequestOptions::new()).await;
    let second = client.get::<TestData>("/test", RequestOptions::new()).await;

    assert_eq!(first.data(), second.data());
    assert_eq!(first.data(), Some(&test_data(3, "Same")));
}
