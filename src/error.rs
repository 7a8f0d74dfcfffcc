// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::database::StoreError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },
    InvalidJson(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 413 Payload Too Large
    PayloadTooLarge(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::InvalidJson(_) => 400,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::PayloadTooLarge(_) => 413,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::InvalidJson(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::PayloadTooLarge(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// `fail` for client errors, `error` for server errors
    pub fn status_label(&self) -> &'static str {
        if self.status_code() < 500 { "fail" } else { "error" }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut response = json!({
            "status": self.status_label(),
            "message": self.message(),
            "code": self.error_code()
        });

        if let ApiError::ValidationError { field_errors: Some(field_errors), .. } = self {
            response["field_errors"] = json!(field_errors);
        }

        response
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::InvalidJson(_) => "INVALID_JSON",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(
        message: impl Into<String>,
        field_errors: Option<HashMap<String, String>>,
    ) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        ApiError::InvalidJson(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        ApiError::PayloadTooLarge(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => ApiError::not_found(msg),
            StoreError::InvalidId(value) => ApiError::bad_request(format!("Invalid _id: {}", value)),
            StoreError::DuplicateKey { field, value } => {
                tracing::debug!("Duplicate value for unique field {}", field);
                ApiError::conflict(format!("Duplicate field value: {}. Please use another value!", value))
            }
            StoreError::UnsupportedOperator(op) => {
                ApiError::bad_request(format!("Unsupported query operator: {}", op))
            }
            StoreError::InvalidProjection(msg) => ApiError::bad_request(format!("Invalid projection: {}", msg)),
            StoreError::InvalidQuery(msg) => ApiError::bad_request(format!("Invalid query: {}", msg)),
            StoreError::ConfigMissing(key) => {
                tracing::error!("Missing configuration: {}", key);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            StoreError::Sqlx(sqlx_err) => {
                // Log the real error but return generic message
                tracing::error!("SQLx error: {}", sqlx_err);
                match sqlx_err {
                    sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                        ApiError::service_unavailable("Database temporarily unavailable")
                    }
                    _ => ApiError::internal_server_error("Database error occurred"),
                }
            }
            StoreError::Io(io_err) => {
                tracing::error!("I/O error: {}", io_err);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            StoreError::Json(json_err) => {
                tracing::error!("JSON error: {}", json_err);
                ApiError::internal_server_error("Failed to format response")
            }
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_use_fail_status() {
        let body = ApiError::not_found("No movie with that ID!").to_json();
        assert_eq!(
            body,
            json!({"status": "fail", "message": "No movie with that ID!", "code": "NOT_FOUND"})
        );
    }

    #[test]
    fn server_errors_use_error_status() {
        let err = ApiError::internal_server_error("boom");
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.to_json()["status"], "error");
    }

    #[test]
    fn store_errors_map_to_http_statuses() {
        let dup: ApiError = StoreError::DuplicateKey { field: "title".into(), value: "Heat".into() }.into();
        assert_eq!(dup.status_code(), 409);
        assert_eq!(dup.message(), "Duplicate field value: Heat. Please use another value!");

        let op: ApiError = StoreError::UnsupportedOperator("regex".into()).into();
        assert_eq!(op.status_code(), 400);

        let projection: ApiError = StoreError::InvalidProjection("mixed".into()).into();
        assert_eq!(projection.status_code(), 400);

        let id: ApiError = StoreError::InvalidId("nope".into()).into();
        assert_eq!(id.message(), "Invalid _id: nope");
    }
}
