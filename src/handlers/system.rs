// handlers/system.rs - service banner, health check and unknown-route fallback

use axum::{
    extract::{OriginalUri, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Value};
use tracing::warn;

use crate::app::AppState;
use crate::error::ApiError;

/// GET /
pub async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "success",
        "data": {
            "name": "Movies API",
            "version": env!("CARGO_PKG_VERSION"),
            "environment": state.config.environment,
            "endpoints": {
                "health": "/health",
                "movies": "/api/v1/movies[/:id]",
                "top5": "/api/v1/movies/top-5",
                "stats": "/api/v1/movies/movies-stat",
                "topGenre": "/api/v1/movies/top-genre/:year",
            },
            "query": {
                "page": "1-based page number",
                "limit": format!("page size, at most {}", state.config.features.max_limit),
                "sort": "comma-separated fields, '-' prefix for descending",
                "fields": "comma-separated projection",
                "<field>[gte|gt|lte|lt]": "comparison filter",
            }
        }
    }))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Response {
    let now = chrono::Utc::now();

    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": now,
                "database": "ok"
            })),
        )
            .into_response(),
        Err(e) => {
            warn!("Health check failed: {}", e);
            ApiError::service_unavailable("Database unavailable").into_response()
        }
    }
}

/// Any route not matched above
pub async fn not_found(OriginalUri(uri): OriginalUri) -> ApiError {
    ApiError::not_found(format!("Can't find {}", uri))
}
