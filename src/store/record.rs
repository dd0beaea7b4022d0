//! Persisted request event schema.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::HeaderMap;
use serde::Serialize;
use serde_json::Value;

/// Stored in place of the token header's value so credentials never reach
/// disk, whether or not authentication is enabled.
pub const REDACTED_PLACEHOLDER: &str = "[REDACTED]";

/// One collected request, serialized as a single JSONL line.
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    /// Unix seconds at which the request was handled.
    pub timestamp: f64,
    pub client_ip: String,
    /// Request headers with the token header redacted. Names are normalized
    /// to lowercase by the HTTP stack.
    pub request_headers: BTreeMap<String, String>,
    pub request_url: String,
    /// The parsed JSON body, or `""` when the body was empty.
    pub posted_data: Value,
    /// Present only when authentication is enabled and succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authenticated_user: Option<String>,
}

impl EventRecord {
    /// Build a record for the current request, redacting the token header.
    pub fn new(
        client_ip: String,
        request_url: String,
        headers: &HeaderMap,
        token_header: &str,
        posted_data: Value,
    ) -> Self {
        Self {
            timestamp: unix_timestamp(),
            client_ip,
            request_headers: collect_headers(headers, token_header),
            request_url,
            posted_data,
            authenticated_user: None,
        }
    }
}

fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or(0.0)
}

fn collect_headers(headers: &HeaderMap, token_header: &str) -> BTreeMap<String, String> {
    let mut collected = BTreeMap::new();
    for (name, value) in headers {
        let stored = if name.as_str().eq_ignore_ascii_case(token_header) {
            REDACTED_PLACEHOLDER.to_string()
        } else {
            value.to_str().unwrap_or_default().to_string()
        };
        collected.insert(name.as_str().to_string(), stored);
    }
    collected
}
