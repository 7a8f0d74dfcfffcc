use tracing_subscriber::EnvFilter;

use movies_api::app::{router, AppState};
use movies_api::cli::commands::data::seed_memory_store;
use movies_api::database::DatabaseManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, APP_ENV, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = movies_api::config::config().clone();
    tracing::info!("Starting Movies API in {:?} mode", config.environment);

    let store = DatabaseManager::open_store(&config.database).await?;
    let state = AppState::new(store, config.clone());

    seed_memory_store(&state.movies, &config.database).await?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("Movies API listening on http://{}", bind_addr);

    axum::serve(listener, router(state)).await?;
    Ok(())
}
