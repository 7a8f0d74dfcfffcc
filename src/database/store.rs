use async_trait::async_trait;
use thiserror::Error;

use crate::filter::FilterError;
use crate::query::FindQuery;
use crate::types::Document;

/// Errors raised while executing a query against a document store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid id: {0}")]
    InvalidId(String),

    #[error("Duplicate value for {field}: {value}")]
    DuplicateKey { field: String, value: String },

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Invalid projection: {0}")]
    InvalidProjection(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<FilterError> for StoreError {
    fn from(err: FilterError) -> Self {
        match err {
            FilterError::UnsupportedOperator(op) => StoreError::UnsupportedOperator(op),
            FilterError::InvalidProjection(msg) => StoreError::InvalidProjection(msg),
            other => StoreError::InvalidQuery(other.to_string()),
        }
    }
}

/// Executes collection reads and writes described by `FindQuery` values.
///
/// Filters use the `$`-operator document form produced by the query
/// features (`{"year": {"$gte": "2000"}}`). Every write returns the stored
/// document as it looks afterwards.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>, StoreError>;

    async fn find_one(&self, collection: &str, query: &FindQuery) -> Result<Option<Document>, StoreError> {
        let mut query = query.clone();
        query.limit = Some(1);
        Ok(self.find(collection, &query).await?.into_iter().next())
    }

    async fn count(&self, collection: &str, query: &FindQuery) -> Result<u64, StoreError>;

    /// Store a document that already carries its system fields
    async fn insert_one(&self, collection: &str, doc: Document) -> Result<Document, StoreError>;

    async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<Vec<Document>, StoreError> {
        let mut inserted = Vec::with_capacity(docs.len());
        for doc in docs {
            inserted.push(self.insert_one(collection, doc).await?);
        }
        Ok(inserted)
    }

    /// Shallow-merge `patch` into the first document matching `query`
    async fn update_one(
        &self,
        collection: &str,
        query: &FindQuery,
        patch: Document,
    ) -> Result<Option<Document>, StoreError>;

    async fn delete_one(&self, collection: &str, query: &FindQuery) -> Result<Option<Document>, StoreError>;

    async fn delete_many(&self, collection: &str, query: &FindQuery) -> Result<u64, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
