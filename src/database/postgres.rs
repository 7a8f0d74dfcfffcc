use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgDatabaseError};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use super::manager::DatabaseManager;
use super::store::{DocumentStore, StoreError};
use crate::filter::types::SqlResult;
use crate::filter::Filter;
use crate::query::FindQuery;
use crate::types::{Document, ID_FIELD};

/// Postgres document store. Each collection is a table `(id uuid, doc jsonb)`.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn filter_for(collection: &str, query: &FindQuery) -> Result<Filter, StoreError> {
        let mut filter = Filter::new(collection)?;
        filter.assign(query)?;
        Ok(filter)
    }

    async fn fetch_docs(&self, sql: &SqlResult) -> Result<Vec<Document>, StoreError> {
        debug!("SQL: {} (params: {})", sql.query, sql.params.len());
        let rows = bind_params(sqlx::query(&sql.query), &sql.params)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        rows.iter().map(row_to_document).collect()
    }
}

fn bind_params<'q>(
    mut q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    params: &'q [Value],
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    // Every placeholder is compared against jsonb, so parameters bind as jsonb
    for p in params {
        q = q.bind(Json(p));
    }
    q
}

fn row_to_document(row: &sqlx::postgres::PgRow) -> Result<Document, StoreError> {
    let Json(value): Json<Value> = row.try_get("doc")?;
    match value {
        Value::Object(doc) => Ok(doc),
        other => Err(StoreError::InvalidQuery(format!("stored document is not an object: {}", other))),
    }
}

/// Unique violations become duplicate-key errors
fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            let field = unique_field_of(db_err.constraint().unwrap_or_default(), db_err.table());
            // detail reads `Key ((doc ->> 'title'::text))=(Heat) already exists.`
            let value = db_err
                .try_downcast_ref::<PgDatabaseError>()
                .and_then(|pg| pg.detail())
                .and_then(|detail| detail.rsplit_once("=("))
                .map(|(_, rest)| rest.trim_end_matches(" already exists.").trim_end_matches(')').to_string())
                .unwrap_or_default();
            return StoreError::DuplicateKey { field, value };
        }
    }
    StoreError::Sqlx(err)
}

/// Field name behind a unique index; field names may themselves contain underscores
fn unique_field_of(constraint: &str, table: Option<&str>) -> String {
    let field = match table {
        Some(table) => constraint.strip_prefix(&DatabaseManager::unique_index_prefix(table)),
        None => constraint.split_once("_unique_").map(|(_, field)| field),
    };
    field.filter(|f| !f.is_empty()).unwrap_or("unknown").to_string()
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>, StoreError> {
        let sql = Self::filter_for(collection, query)?.to_sql()?;
        self.fetch_docs(&sql).await
    }

    async fn count(&self, collection: &str, query: &FindQuery) -> Result<u64, StoreError> {
        let sql = Self::filter_for(collection, query)?.to_count_sql()?;
        let row = bind_params(sqlx::query(&sql.query), &sql.params)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        let count: i64 = row.try_get("count")?;
        Ok(count.max(0) as u64)
    }

    async fn insert_one(&self, collection: &str, doc: Document) -> Result<Document, StoreError> {
        // Validates the table name
        Filter::new(collection)?;
        let id = doc
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::InvalidId("document has no string _id".to_string()))?;
        let id = Uuid::parse_str(id).map_err(|_| StoreError::InvalidId(id.to_string()))?;

        let query = format!(
            "INSERT INTO \"{}\" (\"{}\", \"{}\") VALUES ($1, $2) RETURNING \"{}\"",
            collection,
            Filter::ID_COLUMN,
            Filter::DOC_COLUMN,
            Filter::DOC_COLUMN
        );
        let row = sqlx::query(&query)
            .bind(id)
            .bind(Json(Value::Object(doc)))
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        row_to_document(&row)
    }

    async fn update_one(
        &self,
        collection: &str,
        query: &FindQuery,
        patch: Document,
    ) -> Result<Option<Document>, StoreError> {
        let sql = Self::filter_for(collection, query)?.to_update_one_sql(patch)?;
        Ok(self.fetch_docs(&sql).await?.into_iter().next())
    }

    async fn delete_one(&self, collection: &str, query: &FindQuery) -> Result<Option<Document>, StoreError> {
        let sql = Self::filter_for(collection, query)?.to_delete_one_sql()?;
        Ok(self.fetch_docs(&sql).await?.into_iter().next())
    }

    async fn delete_many(&self, collection: &str, query: &FindQuery) -> Result<u64, StoreError> {
        let sql = Self::filter_for(collection, query)?.to_delete_many_sql()?;
        let result = bind_params(sqlx::query(&sql.query), &sql.params)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
