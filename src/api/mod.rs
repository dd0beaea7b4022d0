// HTTP endpoints for the collector

#[cfg(test)]
mod integration_tests;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{ConnectInfo, Path, Request, State},
    http::{HeaderMap, StatusCode, Uri, header, request::Parts},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::Value;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::auth::{AuthError, TokenAuthenticator};
use crate::store::{EventRecord, LogStore, StoreError};

/// Largest accepted request body. Matches the framework default for JSON
/// extraction.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

const BAD_JSON_MESSAGE: &str = "ERROR - improperly formatted JSON data";
const UNKNOWN_URL_MESSAGE: &str = "Unknown URL";

/// Shared state for all collector handlers.
pub struct AppState {
    pub authenticator: TokenAuthenticator,
    pub store: LogStore,
}

pub type SharedState = Arc<AppState>;

pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/json-collector/health-check", get(health_check))
        .route(
            "/json-collector/{project}",
            get(serve_project_log).post(ingest_json_data),
        )
        .fallback(unknown_url)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn health_check() -> &'static str {
    "Everything is ay oh kay"
}

/// POST /json-collector/{project}: authenticate, parse the JSON body, build
/// an event record, rotate-if-needed, and append one JSONL line.
async fn ingest_json_data(
    State(state): State<SharedState>,
    Path(project): Path<String>,
    request: Request,
) -> Response {
    let (parts, body) = request.into_parts();
    let client_ip = client_ip(&parts);
    let request_url = request_url(&parts);

    let authenticated_user = match authenticate(&state.authenticator, &parts.headers).await {
        Ok(user) => user,
        Err(err) => return auth_error_response(&err, &client_ip, &request_url),
    };

    let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => {
            warn!(client_ip = %client_ip, url = %request_url, status = 400, "Unreadable request body");
            return (StatusCode::BAD_REQUEST, BAD_JSON_MESSAGE).into_response();
        }
    };

    let posted_data = if body.is_empty() {
        Value::String(String::new())
    } else {
        match serde_json::from_slice::<Value>(&body) {
            // A literal `null` body is stored the same way as an empty one.
            Ok(Value::Null) => Value::String(String::new()),
            Ok(value) => value,
            Err(_) => {
                info!(client_ip = %client_ip, url = %request_url, status = 400, "Rejected malformed JSON payload");
                return (StatusCode::BAD_REQUEST, BAD_JSON_MESSAGE).into_response();
            }
        }
    };

    let mut record = EventRecord::new(
        client_ip.clone(),
        request_url.clone(),
        &parts.headers,
        state.authenticator.header_name(),
        posted_data,
    );
    record.authenticated_user = authenticated_user;

    if let Err(err) = state.store.append(&project, &record) {
        error!(client_ip = %client_ip, url = %request_url, error = %err, "Failed to persist record");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "ERROR - failed to persist JSON data",
        )
            .into_response();
    }

    info!(client_ip = %client_ip, url = %request_url, status = 200, "JSON data accepted");
    (
        StatusCode::OK,
        format!("JSON data accepted for {}", project),
    )
        .into_response()
}

/// GET /json-collector/{project}: serve the project's current log file.
/// Requires the token when authentication is enabled.
async fn serve_project_log(
    State(state): State<SharedState>,
    Path(project): Path<String>,
    request: Request,
) -> Response {
    let (parts, _) = request.into_parts();
    let client_ip = client_ip(&parts);
    let request_url = request_url(&parts);

    if let Err(err) = authenticate(&state.authenticator, &parts.headers).await {
        return auth_error_response(&err, &client_ip, &request_url);
    }

    match state.store.read(&project) {
        Ok(contents) => {
            info!(client_ip = %client_ip, url = %request_url, status = 200, "Served project log");
            (
                [(header::CONTENT_TYPE, "application/x-ndjson")],
                contents,
            )
                .into_response()
        }
        Err(StoreError::NotFound(_)) => {
            info!(client_ip = %client_ip, url = %request_url, status = 404, "No log file for project");
            (StatusCode::NOT_FOUND, UNKNOWN_URL_MESSAGE).into_response()
        }
        Err(err) => {
            error!(client_ip = %client_ip, url = %request_url, error = %err, "Failed to read project log");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "ERROR - failed to read project log",
            )
                .into_response()
        }
    }
}

async fn unknown_url(uri: Uri) -> Response {
    info!(url = %uri, status = 404, "Unknown URL");
    (StatusCode::NOT_FOUND, UNKNOWN_URL_MESSAGE).into_response()
}

/// Run the token check when authentication is enabled; `None` means open
/// access, `Some(username)` an authenticated request.
async fn authenticate(
    authenticator: &TokenAuthenticator,
    headers: &HeaderMap,
) -> Result<Option<String>, AuthError> {
    if !authenticator.is_enabled().await {
        return Ok(None);
    }
    authenticator.authenticated_username(headers).await.map(Some)
}

fn auth_error_response(err: &AuthError, client_ip: &str, request_url: &str) -> Response {
    let status = err.status_code();
    warn!(
        client_ip = %client_ip,
        url = %request_url,
        status = status.as_u16(),
        error = %err,
        "Request failed authentication"
    );
    // Configuration failures are operator-facing; clients get a generic body.
    let body = match err {
        AuthError::Configuration(_) => "ERROR - token authentication is misconfigured".to_string(),
        _ => err.to_string(),
    };
    (status, body).into_response()
}

/// Client address: forwarding headers first, then the peer socket address.
fn client_ip(parts: &Parts) -> String {
    if let Some(forwarded) = parts
        .headers
        .get("X-Forwarded-For")
        .or_else(|| parts.headers.get("X-Real-IP"))
        .and_then(|value| value.to_str().ok())
    {
        return forwarded.to_string();
    }

    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn request_url(parts: &Parts) -> String {
    let host = parts
        .headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{}{}", host, parts.uri)
}
