#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};

use movies_api::app::{router, AppState};
use movies_api::config::AppConfig;
use movies_api::database::DatabaseManager;

/// A router bound to a free local port, backed by a fresh in-memory store
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub client: reqwest::Client,
}

impl TestServer {
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with(AppConfig::development()).await
    }

    pub async fn spawn_with(config: AppConfig) -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test listener")?;
        let state = AppState::new(Arc::new(DatabaseManager::memory_store()), config);
        tokio::spawn(async move {
            let _ = axum::serve(listener, router(state)).await;
        });

        let server = Self { port, base_url, client: reqwest::Client::new() };
        server.wait_ready(Duration::from_secs(5)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = self.client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str) -> Result<(StatusCode, Value)> {
        let res = self.client.get(self.url(path)).send().await?;
        Ok((res.status(), body_of(res).await?))
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<(StatusCode, Value)> {
        let res = self.client.post(self.url(path)).json(body).send().await?;
        Ok((res.status(), body_of(res).await?))
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<(StatusCode, Value)> {
        let res = self.client.put(self.url(path)).json(body).send().await?;
        Ok((res.status(), body_of(res).await?))
    }

    pub async fn delete(&self, path: &str) -> Result<(StatusCode, Value)> {
        let res = self.client.delete(self.url(path)).send().await?;
        Ok((res.status(), body_of(res).await?))
    }

    /// Create a movie and return its `_id`
    pub async fn create_movie(&self, movie: Value) -> Result<String> {
        let (status, body) = self.post("/api/v1/movies", &movie).await?;
        anyhow::ensure!(status == StatusCode::CREATED, "create failed with {}: {}", status, body);
        body["data"]["movie"]["_id"]
            .as_str()
            .map(str::to_string)
            .context("created movie has no _id")
    }

    pub async fn seed_catalog(&self) -> Result<()> {
        for movie in catalog() {
            self.create_movie(movie).await?;
        }
        Ok(())
    }

    /// `data.movies` of a list request
    pub async fn list(&self, query: &str) -> Result<Vec<Value>> {
        let (status, body) = self.get(&format!("/api/v1/movies{}", query)).await?;
        anyhow::ensure!(status == StatusCode::OK, "list failed with {}: {}", status, body);
        Ok(body["data"]["movies"].as_array().cloned().unwrap_or_default())
    }
}

/// Empty bodies (204) read as `null`
async fn body_of(res: reqwest::Response) -> Result<Value> {
    let bytes = res.bytes().await?;
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(&bytes)?)
}

pub fn titles(movies: &[Value]) -> Vec<String> {
    movies
        .iter()
        .filter_map(|m| m["title"].as_str().map(str::to_string))
        .collect()
}

pub fn catalog() -> Vec<Value> {
    vec![
        json!({
            "title": "Memento", "year": 2000, "duration": 113, "genre": ["Mystery", "Thriller"],
            "director": "Nolan", "ratingAverage": 8.4, "ratingQuantity": 1200, "releaseDate": "2000-10-11"
        }),
        json!({
            "title": "Amelie", "year": 2001, "duration": 122, "genre": ["Comedy", "Romance"],
            "director": "Jeunet", "ratingAverage": 8.3, "ratingQuantity": 800, "releaseDate": "2001-04-25"
        }),
        json!({
            "title": "Spirited Away", "year": 2001, "duration": 125, "genre": ["Animation", "Drama"],
            "director": "Miyazaki", "ratingAverage": 8.6, "ratingQuantity": 900, "releaseDate": "2001-07-20"
        }),
        json!({
            "title": "The Dark Knight", "year": 2008, "duration": 152, "genre": ["Action", "Drama"],
            "director": "Nolan", "ratingAverage": 9.0, "ratingQuantity": 2500, "releaseDate": "2008-07-18"
        }),
        json!({
            "title": "Heat", "year": 1995, "duration": 170, "genre": ["Action", "Drama"],
            "director": "Mann", "ratingAverage": 8.3, "ratingQuantity": 700, "releaseDate": "1995-12-15"
        }),
        json!({
            "title": "Inception", "year": 2010, "duration": 148, "genre": ["Action", "Thriller"],
            "director": "Nolan", "ratingAverage": 8.8, "ratingQuantity": 2300, "releaseDate": "2010-07-16"
        }),
        json!({
            "title": "Unreleased Cut", "year": 2024, "duration": 100, "genre": ["Action"],
            "director": "Nolan", "ratingAverage": 9.9, "ratingQuantity": 1, "isReleased": false,
            "releaseDate": "2024-01-01"
        }),
    ]
}
