use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::get,
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::database::DocumentStore;
use crate::handlers;
use crate::middleware::sanitize_middleware;
use crate::services::MovieService;

/// Shared per-process state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub movies: Arc<MovieService>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, config: AppConfig) -> Self {
        let mut movies = MovieService::new(store.clone(), config.features.clone());
        if config.database.enable_slow_query_warning {
            movies = movies.with_slow_query_warning(config.database.slow_query_threshold_ms);
        }
        Self { store, movies: Arc::new(movies), config: Arc::new(config) }
    }
}

pub fn router(state: AppState) -> Router {
    let api = state.config.api.clone();

    let mut app = Router::new()
        // Public
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .merge(movie_routes())
        .fallback(handlers::not_found)
        // Global middleware
        .layer(from_fn_with_state(api.clone(), sanitize_middleware))
        .layer(DefaultBodyLimit::max(api.max_request_size_bytes));

    if api.enable_request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }

    app.with_state(state)
}

fn movie_routes() -> Router<AppState> {
    Router::new()
        // Aliases and aggregations
        .route("/api/v1/movies/top-5", get(handlers::movies_top_five))
        .route("/api/v1/movies/movies-stat", get(handlers::movies_stats))
        .route("/api/v1/movies/top-genre/:year", get(handlers::movies_top_genre))
        // Collection
        .route("/api/v1/movies", get(handlers::movies_list).post(handlers::movies_create))
        // Single movie
        .route(
            "/api/v1/movies/:id",
            get(handlers::movie_get)
                .put(handlers::movie_put)
                .delete(handlers::movie_delete),
        )
}
