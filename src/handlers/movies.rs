// handlers/movies.rs - /api/v1/movies route handlers

use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;
use crate::features::QueryParams;
use crate::middleware::{ApiResponse, ApiResult};

fn params_of(raw: Option<String>) -> QueryParams {
    raw.as_deref().map(QueryParams::parse).unwrap_or_default()
}

/// Request bodies are parsed here so malformed JSON gets the error envelope
fn json_body(bytes: &Bytes) -> Result<Value, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::bad_request("Invalid data!"));
    }
    serde_json::from_slice(bytes).map_err(|e| ApiError::invalid_json(format!("Invalid JSON body: {}", e)))
}

/// GET /api/v1/movies
pub async fn movies_list(State(state): State<AppState>, RawQuery(raw): RawQuery) -> ApiResult<Value> {
    let movies = state.movies.list(&params_of(raw)).await?;
    let count = movies.len();
    Ok(ApiResponse::list(json!({ "movies": movies }), count))
}

/// GET /api/v1/movies/top-5
pub async fn movies_top_five(State(state): State<AppState>, RawQuery(raw): RawQuery) -> ApiResult<Value> {
    let movies = state.movies.top_five(&params_of(raw)).await?;
    let count = movies.len();
    Ok(ApiResponse::list(json!({ "movies": movies }), count))
}

/// POST /api/v1/movies
pub async fn movies_create(State(state): State<AppState>, body: Bytes) -> ApiResult<Value> {
    let movie = state.movies.create(json_body(&body)?).await?;
    Ok(ApiResponse::created(json!({ "movie": movie })))
}

/// GET /api/v1/movies/:id
pub async fn movie_get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Value> {
    let movie = state.movies.get(&id).await?;
    Ok(ApiResponse::success(json!({ "movie": movie })))
}

/// PUT /api/v1/movies/:id
pub async fn movie_put(State(state): State<AppState>, Path(id): Path<String>, body: Bytes) -> ApiResult<Value> {
    let updated = state.movies.update(&id, json_body(&body)?).await?;
    Ok(ApiResponse::success(json!({ "updatedMovie": updated })))
}

/// DELETE /api/v1/movies/:id
pub async fn movie_delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    state.movies.delete(&id).await?;
    Ok(ApiResponse::<()>::no_content())
}

/// GET /api/v1/movies/movies-stat
pub async fn movies_stats(State(state): State<AppState>) -> ApiResult<Value> {
    let stats = state.movies.stats().await?;
    Ok(ApiResponse::success(json!({ "stats": stats })))
}

/// GET /api/v1/movies/top-genre/:year
pub async fn movies_top_genre(State(state): State<AppState>, Path(year): Path<String>) -> ApiResult<Value> {
    let stats = state.movies.top_genre(&year).await?;
    Ok(ApiResponse::success(json!({ "stats": stats })))
}
