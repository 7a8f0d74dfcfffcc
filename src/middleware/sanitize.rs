use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashSet;

use ammonia::Builder;
use once_cell::sync::Lazy;
use serde_json::{Map, Value};

use crate::config::{ApiConfig, SanitizeMode};
use crate::error::ApiError;

/// Keys that could reach prototype-style lookups in downstream consumers
const FORBIDDEN_KEYS: [&str; 3] = ["__proto__", "constructor", "prototype"];

/// Allows no tags at all; script and style elements lose their contents too
static STRIP_ALL: Lazy<Builder<'static>> = Lazy::new(|| {
    let mut builder = Builder::empty();
    builder.clean_content_tags(HashSet::from(["script", "style"]));
    builder
});

/// Deep-sanitize JSON request bodies before handlers see them.
/// Bodies that are not JSON, or fail to parse, pass through untouched.
pub async fn sanitize_middleware(
    State(api): State<ApiConfig>,
    request: Request,
    next: Next,
) -> Response {
    if api.sanitize_mode == SanitizeMode::Off || !is_json(&request) {
        return next.run(request).await;
    }

    let (mut parts, body) = request.into_parts();
    let bytes = match to_bytes(body, api.max_request_size_bytes).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return ApiError::payload_too_large("Request body is too large").into_response();
        }
    };

    let body = match serde_json::from_slice::<Value>(&bytes) {
        Ok(value) => {
            let cleaned = sanitize_value(value, api.sanitize_mode);
            match serde_json::to_vec(&cleaned) {
                Ok(encoded) => {
                    parts.headers.remove(header::CONTENT_LENGTH);
                    Body::from(encoded)
                }
                Err(_) => Body::from(bytes),
            }
        }
        Err(_) => Body::from(bytes),
    };

    next.run(Request::from_parts(parts, body)).await
}

fn is_json(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().contains("json"))
        .unwrap_or(false)
}

pub fn sanitize_value(value: Value, mode: SanitizeMode) -> Value {
    match value {
        Value::String(s) => Value::String(sanitize_str(&s, mode)),
        Value::Array(items) => Value::Array(items.into_iter().map(|v| sanitize_value(v, mode)).collect()),
        Value::Object(object) => Value::Object(sanitize_object(object, mode)),
        other => other,
    }
}

fn sanitize_object(object: Map<String, Value>, mode: SanitizeMode) -> Map<String, Value> {
    object
        .into_iter()
        .filter(|(key, _)| !FORBIDDEN_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key, sanitize_value(value, mode)))
        .collect()
}

fn sanitize_str(s: &str, mode: SanitizeMode) -> String {
    match mode {
        SanitizeMode::Escape => escape_markup(s),
        SanitizeMode::Strip => STRIP_ALL.clean(s).to_string(),
        SanitizeMode::Off => s.to_string(),
    }
}

/// Only angle brackets are escaped; quotes, ampersands and slashes are plain text
fn escape_markup(s: &str) -> String {
    s.replace('<', "&lt;").replace('>', "&gt;")
}
