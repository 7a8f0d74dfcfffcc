use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::json;

/// Wrapper for API responses that adds the success envelope
/// `{"status": "success", "results"?: n, "data": ...}`
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub results: Option<usize>,
    pub status_code: Option<StatusCode>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful API response with default 200 status
    pub fn success(data: T) -> Self {
        Self {
            data,
            results: None,
            status_code: None, // Default to 200 OK
        }
    }

    /// List response carrying the number of returned items
    pub fn list(data: T, results: usize) -> Self {
        Self {
            data,
            results: Some(results),
            status_code: None,
        }
    }

    /// Create an API response with custom status code
    pub fn with_status(data: T, status_code: StatusCode) -> Self {
        Self {
            data,
            results: None,
            status_code: Some(status_code),
        }
    }

    /// Create a 201 Created response
    pub fn created(data: T) -> Self {
        Self::with_status(data, StatusCode::CREATED)
    }

    /// Create a 204 No Content response (data will be ignored)
    pub fn no_content() -> ApiResponse<()> {
        ApiResponse::with_status((), StatusCode::NO_CONTENT)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(StatusCode::OK);

        // For 204 No Content, return empty response
        if status == StatusCode::NO_CONTENT {
            return status.into_response();
        }

        let data_value = match serde_json::to_value(&self.data) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Failed to serialize response data: {}", e);
                return crate::error::ApiError::internal_server_error("Failed to serialize response data")
                    .into_response();
            }
        };

        let mut envelope = json!({ "status": "success" });
        if let Some(results) = self.results {
            envelope["results"] = json!(results);
        }
        envelope["data"] = data_value;

        (status, Json(envelope)).into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, crate::error::ApiError>;
