use std::sync::Arc;
use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use super::memory::MemoryStore;
use super::postgres::PgStore;
use super::store::{DocumentStore, StoreError};
use crate::config::DatabaseConfig;
use crate::filter::Filter;

/// Name of the movie collection (a table for `PgStore`)
pub const MOVIES_COLLECTION: &str = "movies";

/// Fields that must be unique across the movie collection
pub const MOVIES_UNIQUE_FIELDS: [&str; 1] = ["title"];

pub struct DatabaseManager;

impl DatabaseManager {
    /// Store selected by configuration: Postgres when a URL is set, in-memory otherwise
    pub async fn open_store(config: &DatabaseConfig) -> Result<Arc<dyn DocumentStore>, StoreError> {
        match &config.url {
            Some(url) => {
                let pool = Self::connect(url, config).await?;
                Self::ensure_collection(&pool, MOVIES_COLLECTION, &MOVIES_UNIQUE_FIELDS).await?;
                Ok(Arc::new(PgStore::new(pool)))
            }
            None => {
                info!("DATABASE_URL not set, using in-memory store");
                Ok(Arc::new(Self::memory_store()))
            }
        }
    }

    pub fn memory_store() -> MemoryStore {
        MOVIES_UNIQUE_FIELDS
            .iter()
            .fold(MemoryStore::new(), |store, field| store.with_unique_field(MOVIES_COLLECTION, field))
    }

    pub async fn connect(url: &str, config: &DatabaseConfig) -> Result<PgPool, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await?;
        info!("Created database pool (max {} connections)", config.max_connections);
        Ok(pool)
    }

    /// Create the document table and its unique indexes if missing
    pub async fn ensure_collection(pool: &PgPool, collection: &str, unique_fields: &[&str]) -> Result<(), StoreError> {
        // Validates the table name before it is spliced into DDL
        Filter::new(collection)?;
        for statement in Self::collection_ddl(collection, unique_fields)? {
            sqlx::query(&statement).execute(pool).await?;
        }
        info!("Ensured collection table: {}", collection);
        Ok(())
    }

    /// Unique indexes are named `<table>_unique_<field>`
    pub fn unique_index_prefix(collection: &str) -> String {
        format!("{}_unique_", collection)
    }

    fn collection_ddl(collection: &str, unique_fields: &[&str]) -> Result<Vec<String>, StoreError> {
        let mut statements = vec![format!(
            "CREATE TABLE IF NOT EXISTS \"{table}\" (\"{id}\" uuid PRIMARY KEY, \"{doc}\" jsonb NOT NULL)",
            table = collection,
            id = Filter::ID_COLUMN,
            doc = Filter::DOC_COLUMN,
        )];
        for field in unique_fields {
            crate::filter::FieldPath::parse(field)?;
            statements.push(format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS \"{index}{field}\" ON \"{table}\" ((\"{doc}\" ->> '{field}'))",
                index = Self::unique_index_prefix(collection),
                table = collection,
                doc = Filter::DOC_COLUMN,
            ));
        }
        Ok(statements)
    }
}
