//! End-to-end router tests driving the collector over HTTP.

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use super::{AppState, create_router};
use crate::auth::TokenAuthenticator;
use crate::store::LogStore;

fn collector_app(
    data_dir: &std::path::Path,
    max_file_size: u64,
    tokens_file: Option<PathBuf>,
    header_name: &str,
) -> Router {
    let authenticator = TokenAuthenticator::new(
        tokens_file.clone(),
        header_name.to_string(),
        tokens_file.is_some(),
    )
    .unwrap();
    let store = LogStore::new(data_dir.to_path_buf(), max_file_size);
    create_router(Arc::new(AppState {
        authenticator,
        store,
    }))
}

fn open_app(data_dir: &std::path::Path) -> Router {
    collector_app(data_dir, 1024 * 1024, None, "X-JSON-Collector-Token")
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

fn post_json(path: &str, body: &str, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header("host", "localhost:8000")
        .header("content-type", "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(path: &str, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder()
        .method("GET")
        .uri(path)
        .header("host", "localhost:8000");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::empty()).unwrap()
}

fn last_record(data_dir: &std::path::Path, file_name: &str) -> Value {
    let contents = std::fs::read_to_string(data_dir.join(file_name)).unwrap();
    let line = contents.trim().lines().last().unwrap();
    serde_json::from_str(line).unwrap()
}

#[tokio::test]
async fn test_health_check_returns_success_message() {
    let dir = TempDir::new().unwrap();
    let app = open_app(dir.path());

    let (status, body) = send(&app, get("/json-collector/health-check", &[])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Everything is ay oh kay");
}

#[tokio::test]
async fn test_post_persists_json_payload() {
    let dir = TempDir::new().unwrap();
    let app = open_app(dir.path());

    let payload = json!({"temperature": 21});
    let (status, body) = send(
        &app,
        post_json("/json-collector/test-dataset", &payload.to_string(), &[]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "JSON data accepted for test-dataset");

    let record = last_record(dir.path(), "testdataset.jsonl");
    assert_eq!(record["posted_data"], payload);
    assert_eq!(
        record["request_url"],
        "http://localhost:8000/json-collector/test-dataset"
    );
    assert!(record["timestamp"].is_f64());
}

#[tokio::test]
async fn test_post_then_get_round_trips() {
    let dir = TempDir::new().unwrap();
    let app = open_app(dir.path());

    let payload = json!({"reading": [1, 2, 3]});
    send(
        &app,
        post_json("/json-collector/roundtrip", &payload.to_string(), &[]),
    )
    .await;

    let (status, body) = send(&app, get("/json-collector/roundtrip", &[])).await;
    assert_eq!(status, StatusCode::OK);

    let record: Value = serde_json::from_str(body.trim().lines().last().unwrap()).unwrap();
    assert_eq!(record["posted_data"], payload);
}

#[tokio::test]
async fn test_invalid_json_returns_bad_request() {
    let dir = TempDir::new().unwrap();
    let app = open_app(dir.path());

    let (status, body) = send(
        &app,
        post_json("/json-collector/broken-feed", "{not valid", &[]),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "ERROR - improperly formatted JSON data");
    // The raw body is never persisted.
    assert!(!dir.path().join("brokenfeed.jsonl").exists());
}

#[tokio::test]
async fn test_empty_body_is_stored_as_empty_string() {
    let dir = TempDir::new().unwrap();
    let app = open_app(dir.path());

    let (status, _) = send(&app, post_json("/json-collector/empty-feed", "", &[])).await;
    assert_eq!(status, StatusCode::OK);

    let record = last_record(dir.path(), "emptyfeed.jsonl");
    assert_eq!(record["posted_data"], "");
}

#[tokio::test]
async fn test_log_files_rotate_when_max_size_reached() {
    let dir = TempDir::new().unwrap();
    let app = collector_app(dir.path(), 1, None, "X-JSON-Collector-Token");

    send(
        &app,
        post_json("/json-collector/rotation-feed", r#"{"a": 1}"#, &[]),
    )
    .await;
    send(
        &app,
        post_json("/json-collector/rotation-feed", r#"{"a": 2}"#, &[]),
    )
    .await;

    let rotated = last_record(dir.path(), "rotationfeed.1.jsonl");
    let current = last_record(dir.path(), "rotationfeed.jsonl");
    assert_eq!(rotated["posted_data"], json!({"a": 1}));
    assert_eq!(current["posted_data"], json!({"a": 2}));
}

#[tokio::test]
async fn test_authorized_token_allows_post_and_redacts_header() {
    let dir = TempDir::new().unwrap();
    let tokens_file = dir.path().join("tokens.json");
    std::fs::write(&tokens_file, r#"{"alice": "token-123"}"#).unwrap();
    let app = collector_app(dir.path(), 1024 * 1024, Some(tokens_file), "X-Custom-Token");

    let payload = json!({"temperature": 18});
    let (status, body) = send(
        &app,
        post_json(
            "/json-collector/secure-feed",
            &payload.to_string(),
            &[("X-Custom-Token", "token-123")],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "JSON data accepted for secure-feed");

    let record = last_record(dir.path(), "securefeed.jsonl");
    assert_eq!(record["posted_data"], payload);
    assert_eq!(record["authenticated_user"], "alice");
    assert_eq!(record["request_headers"]["x-custom-token"], "[REDACTED]");
}

#[tokio::test]
async fn test_missing_token_header_names_header_in_error() {
    let dir = TempDir::new().unwrap();
    let tokens_file = dir.path().join("tokens.json");
    std::fs::write(&tokens_file, r#"{"alice": "token-123"}"#).unwrap();
    let app = collector_app(
        dir.path(),
        1024 * 1024,
        Some(tokens_file),
        "X-JSON-Collector-Token",
    );

    let (status, body) = send(
        &app,
        post_json("/json-collector/secure-feed", r#"{"temperature": 21}"#, &[]),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("Missing required token header 'X-JSON-Collector-Token'"));
    assert!(!dir.path().join("securefeed.jsonl").exists());
}

#[tokio::test]
async fn test_invalid_token_is_rejected() {
    let dir = TempDir::new().unwrap();
    let tokens_file = dir.path().join("tokens.json");
    std::fs::write(&tokens_file, r#"{"alice": "token-123"}"#).unwrap();
    let app = collector_app(
        dir.path(),
        1024 * 1024,
        Some(tokens_file),
        "X-JSON-Collector-Token",
    );

    let (status, body) = send(
        &app,
        post_json(
            "/json-collector/secure-feed",
            r#"{"temperature": 21}"#,
            &[("X-JSON-Collector-Token", "wrong-token")],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("Provided token is not recognized"));
}

#[tokio::test]
async fn test_get_requires_token_when_auth_enabled() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("securedataset.jsonl"), "{\"sample\": 1}\n").unwrap();
    let tokens_file = dir.path().join("tokens.json");
    std::fs::write(&tokens_file, r#"{"alice": "token-123"}"#).unwrap();
    let app = collector_app(
        dir.path(),
        1024 * 1024,
        Some(tokens_file),
        "X-JSON-Collector-Token",
    );

    let (status, _) = send(&app, get("/json-collector/secure-dataset", &[])).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        get(
            "/json-collector/secure-dataset",
            &[("X-JSON-Collector-Token", "wrong-token")],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        get(
            "/json-collector/secure-dataset",
            &[("X-JSON-Collector-Token", "token-123")],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "{\"sample\": 1}\n");
}

#[tokio::test]
async fn test_token_header_is_redacted_when_auth_disabled() {
    let dir = TempDir::new().unwrap();
    let app = open_app(dir.path());

    let (status, _) = send(
        &app,
        post_json(
            "/json-collector/no-auth-feed",
            r#"{"temperature": 19}"#,
            &[("X-JSON-Collector-Token", "should-not-leak")],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let record = last_record(dir.path(), "noauthfeed.jsonl");
    assert_eq!(
        record["request_headers"]["x-json-collector-token"],
        "[REDACTED]"
    );
    assert!(record.get("authenticated_user").is_none());

    let encoded = std::fs::read_to_string(dir.path().join("noauthfeed.jsonl")).unwrap();
    assert!(!encoded.contains("should-not-leak"));
}

#[tokio::test]
async fn test_get_unknown_project_returns_not_found() {
    let dir = TempDir::new().unwrap();
    let app = open_app(dir.path());

    let (status, body) = send(&app, get("/json-collector/ghost", &[])).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "Unknown URL");
}

#[tokio::test]
async fn test_unknown_route_returns_not_found() {
    let dir = TempDir::new().unwrap();
    let app = open_app(dir.path());

    let (status, body) = send(&app, get("/not-a-route", &[])).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "Unknown URL");
}

#[tokio::test]
async fn test_authorized_tokens_file_is_not_served_via_get() {
    let dir = TempDir::new().unwrap();
    let tokens_file = dir.path().join("authorized_tokens.json");
    std::fs::write(&tokens_file, r#"{"alice": "token-123"}"#).unwrap();
    let app = collector_app(
        dir.path(),
        1024 * 1024,
        Some(tokens_file),
        "X-JSON-Collector-Token",
    );

    // Project names only ever map to sanitized .jsonl paths, so the
    // credentials file itself is unreachable.
    let (status, _) = send(
        &app,
        get(
            "/json-collector/authorized_tokens",
            &[("X-JSON-Collector-Token", "token-123")],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_client_ip_prefers_forwarding_headers() {
    let dir = TempDir::new().unwrap();
    let app = open_app(dir.path());

    send(
        &app,
        post_json(
            "/json-collector/forwarded",
            r#"{"a": 1}"#,
            &[("X-Forwarded-For", "203.0.113.9")],
        ),
    )
    .await;

    let record = last_record(dir.path(), "forwarded.jsonl");
    assert_eq!(record["client_ip"], "203.0.113.9");
}
