use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Subcommand;
use serde_json::Value;

use crate::cli::OutputFormat;
use crate::config::{config, DatabaseConfig};
use crate::database::{DatabaseManager, DocumentStore, StoreError};
use crate::features::QueryParams;
use crate::services::MovieService;

#[derive(Subcommand)]
pub enum DataCommands {
    #[command(about = "Import movies from a JSON file (an array of movie objects)")]
    Import {
        #[arg(help = "Input file path")]
        input: String,
    },

    #[command(about = "Delete every movie in the collection")]
    Delete,

    #[command(about = "Select movies using API query-string syntax")]
    Select {
        #[arg(long, help = "Query string, e.g. 'year[gte]=2000&sort=-year&fields=title,year'")]
        query: Option<String>,
    },
}

pub async fn handle(cmd: DataCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let settings = config();

    match cmd {
        DataCommands::Import { input } => {
            let store = persistent_store().await?;
            let movies = read_movies(Path::new(&input)).await?;
            let service = MovieService::new(store, settings.features.clone());
            let count = service.import(movies).await?;
            println!("Imported {} movies from {}", count, input);
            Ok(())
        }
        DataCommands::Delete => {
            let store = persistent_store().await?;
            let service = MovieService::new(store, settings.features.clone());
            let count = service.delete_all().await?;
            println!("Deleted {} movies", count);
            Ok(())
        }
        DataCommands::Select { query } => {
            let store = DatabaseManager::open_store(&settings.database).await?;
            let service = MovieService::new(store, settings.features.clone());
            seed_memory_store(&service, &settings.database).await?;

            let params = query.as_deref().map(QueryParams::parse).unwrap_or_default();
            let movies = service.list(&params).await?;
            match output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&movies)?),
                OutputFormat::Text => {
                    for movie in &movies {
                        println!("{}", Value::Object(movie.clone()));
                    }
                    println!("({} movies)", movies.len());
                }
            }
            Ok(())
        }
    }
}

/// Writes are pointless against the in-memory store, so they need a database URL
async fn persistent_store() -> anyhow::Result<Arc<dyn DocumentStore>> {
    let database = &config().database;
    if database.url.is_none() {
        return Err(StoreError::ConfigMissing("DATABASE_URL").into());
    }
    Ok(DatabaseManager::open_store(database).await?)
}

/// Load the configured seed file into an in-memory store. A database-backed
/// store keeps its own data, so nothing is imported when a URL is set.
pub async fn seed_memory_store(service: &MovieService, database: &DatabaseConfig) -> anyhow::Result<usize> {
    let Some(seed) = &database.seed_file else {
        return Ok(0);
    };
    if database.url.is_some() {
        tracing::info!("DATABASE_URL is set, skipping seed file {}", seed);
        return Ok(0);
    }
    let count = service.import(read_movies(Path::new(seed)).await?).await?;
    tracing::info!("Seeded {} movies from {}", count, seed);
    Ok(count)
}

pub async fn read_movies(path: &Path) -> anyhow::Result<Vec<Value>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_movies(&text).with_context(|| format!("failed to parse {}", path.display()))
}

/// A file holds either an array of movies or a single movie object
fn parse_movies(text: &str) -> anyhow::Result<Vec<Value>> {
    match serde_json::from_str::<Value>(text)? {
        Value::Array(items) => Ok(items),
        object @ Value::Object(_) => Ok(vec![object]),
        other => anyhow::bail!("expected an array of movies, found {}", kind_of(&other)),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
