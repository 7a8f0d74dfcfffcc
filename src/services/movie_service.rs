use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::movie_stats;
use crate::config::FeaturesConfig;
use crate::database::{DocumentStore, StoreError, MOVIES_COLLECTION};
use crate::error::ApiError;
use crate::features::{ApiFeatures, QueryParams};
use crate::query::{CollectionQuery, FindQuery, Projection};
use crate::types::{doc_of, Document, CREATED_AT_FIELD, ID_FIELD, SYSTEM_FIELDS, VERSION_FIELD};

/// Parameters forced by the top-5 alias, on top of the caller's own
pub const TOP_FIVE_OVERRIDES: [(&str, &str); 3] = [
    ("sort", "-ratingAverage,-year"),
    ("fields", "title,year,ratingAverage"),
    ("limit", "5"),
];

/// Genre left out of the overall stats
const STATS_EXCLUDED_GENRE: &str = "Drama";
const STATS_MIN_YEAR: i64 = 2000;
const TOP_GENRE_LIMIT: usize = 5;

/// Movie operations on top of a document store. Every read, update and delete
/// only sees released movies: documents with `isReleased: false` are hidden.
#[derive(Clone)]
pub struct MovieService {
    store: Arc<dyn DocumentStore>,
    features: FeaturesConfig,
    slow_query_ms: Option<u64>,
}

impl MovieService {
    pub fn new(store: Arc<dyn DocumentStore>, features: FeaturesConfig) -> Self {
        Self { store, features, slow_query_ms: None }
    }

    /// Log store calls slower than `threshold_ms` at `warn`
    pub fn with_slow_query_warning(mut self, threshold_ms: u64) -> Self {
        self.slow_query_ms = Some(threshold_ms);
        self
    }

    /// Filter, sort, project and page the collection from query-string parameters
    pub async fn list(&self, params: &QueryParams) -> Result<Vec<Document>, ApiError> {
        let query = ApiFeatures::new(FindQuery::new(), params, &self.features)
            .filter()
            .sort()
            .limit_fields()
            .paginate()
            .into_query();
        let movies = self.find(query).await?;
        Ok(movies.into_iter().map(with_virtuals).collect())
    }

    /// Five best-rated movies; the caller's filter keys still apply
    pub async fn top_five(&self, params: &QueryParams) -> Result<Vec<Document>, ApiError> {
        self.list(&params.with_overrides(&TOP_FIVE_OVERRIDES)).await
    }

    pub async fn create(&self, body: Value) -> Result<Document, ApiError> {
        let input = input_document(body)?;
        let movie = self.insert_prepared(input).await?;
        info!("Created movie {}", movie.get(ID_FIELD).and_then(serde_json::Value::as_str).unwrap_or_default());
        Ok(self.render(movie))
    }

    pub async fn get(&self, id: &str) -> Result<Document, ApiError> {
        let movie = self
            .timed("find_one", self.store.find_one(MOVIES_COLLECTION, &self.by_id(id)?))
            .await?
            .ok_or_else(not_found)?;
        Ok(self.render(movie))
    }

    /// Shallow-merge `body` into the movie and return the updated document
    pub async fn update(&self, id: &str, body: Value) -> Result<Document, ApiError> {
        let mut patch = input_document(body)?;
        apply_slug(&mut patch);
        let updated = self
            .timed("update_one", self.store.update_one(MOVIES_COLLECTION, &self.by_id(id)?, patch))
            .await?
            .ok_or_else(not_found)?;
        Ok(self.render(updated))
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.timed("delete_one", self.store.delete_one(MOVIES_COLLECTION, &self.by_id(id)?))
            .await?
            .ok_or_else(not_found)?;
        Ok(())
    }

    /// Per-genre stats over movies from 2000 onwards
    pub async fn stats(&self) -> Result<Vec<Value>, ApiError> {
        let query = FindQuery::matching(doc_of("year", json!({ "$gte": STATS_MIN_YEAR })));
        let movies = self.find(query).await?;
        Ok(movie_stats::genre_stats(&movies, STATS_EXCLUDED_GENRE))
    }

    /// Genres with the most movies released during `year`
    pub async fn top_genre(&self, year: &str) -> Result<Vec<Value>, ApiError> {
        let year: i32 = year
            .trim()
            .parse()
            .ok()
            .filter(|y| (0..=9998).contains(y))
            .ok_or_else(|| ApiError::bad_request(format!("Invalid year: {}", year)))?;
        let range = json!({
            "$gte": format!("{:04}-01-01", year),
            "$lt": format!("{:04}-01-01", year + 1),
        });
        let movies = self.find(FindQuery::matching(doc_of("releaseDate", range))).await?;
        Ok(movie_stats::top_genres(&movies, TOP_GENRE_LIMIT))
    }

    /// Bulk-load documents, assigning system fields the same way `create` does
    pub async fn import(&self, docs: Vec<Value>) -> Result<usize, ApiError> {
        let mut prepared = Vec::with_capacity(docs.len());
        for doc in docs {
            let mut input = input_document(doc)?;
            apply_slug(&mut input);
            assign_system_fields(&mut input);
            prepared.push(input);
        }
        let inserted = self.store.insert_many(MOVIES_COLLECTION, prepared).await?;
        info!("Imported {} movies", inserted.len());
        Ok(inserted.len())
    }

    /// Remove every movie, released or not
    pub async fn delete_all(&self) -> Result<u64, ApiError> {
        let removed = self.store.delete_many(MOVIES_COLLECTION, &FindQuery::new()).await?;
        info!("Deleted {} movies", removed);
        Ok(removed)
    }

    async fn insert_prepared(&self, mut input: Document) -> Result<Document, ApiError> {
        apply_slug(&mut input);
        assign_system_fields(&mut input);
        Ok(self.store.insert_one(MOVIES_COLLECTION, input).await?)
    }

    /// Run a read with the released-only constraint added
    async fn find(&self, mut query: FindQuery) -> Result<Vec<Document>, ApiError> {
        query.find(released_only());
        Ok(self.timed("find", self.store.find(MOVIES_COLLECTION, &query)).await?)
    }

    fn by_id(&self, id: &str) -> Result<FindQuery, ApiError> {
        let id = Uuid::parse_str(id.trim()).map_err(|_| ApiError::bad_request(format!("Invalid _id: {}", id)))?;
        let mut query = FindQuery::matching(doc_of(ID_FIELD, json!(id.to_string())));
        query.find(released_only());
        Ok(query)
    }

    /// Single-document responses hide the configured internal fields
    fn render(&self, movie: Document) -> Document {
        let hidden = Projection::excluding(self.features.hidden_fields.iter().cloned());
        with_virtuals(hidden.apply(&movie))
    }

    async fn timed<T, F>(&self, operation: &str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let start = Instant::now();
        let result = fut.await;
        let elapsed = start.elapsed().as_millis();
        match self.slow_query_ms {
            Some(threshold) if elapsed > u128::from(threshold) => {
                warn!("Slow {} on {}: {}ms", operation, MOVIES_COLLECTION, elapsed)
            }
            _ => debug!("{} on {} took {}ms", operation, MOVIES_COLLECTION, elapsed),
        }
        result
    }
}

fn released_only() -> Document {
    doc_of("isReleased", json!({ "$ne": false }))
}

fn not_found() -> ApiError {
    ApiError::not_found("No movie with that ID!")
}

/// Request bodies must be JSON objects without system fields
fn input_document(body: Value) -> Result<Document, ApiError> {
    match body {
        Value::Object(map) => {
            if let Some(field) = SYSTEM_FIELDS.iter().find(|f| map.contains_key(**f)) {
                let message = format!("System field '{}' cannot be set via API", field);
                let field_errors = HashMap::from([(field.to_string(), message.clone())]);
                return Err(ApiError::validation_error(message, Some(field_errors)));
            }
            Ok(map)
        }
        _ => Err(ApiError::bad_request("Invalid data!")),
    }
}

fn assign_system_fields(doc: &mut Document) {
    doc.insert(ID_FIELD.to_string(), json!(Uuid::new_v4().to_string()));
    doc.insert(
        CREATED_AT_FIELD.to_string(),
        json!(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    doc.insert(VERSION_FIELD.to_string(), json!(0));
}

fn apply_slug(doc: &mut Document) {
    if let Some(title) = doc.get("title").and_then(Value::as_str) {
        let slug = slugify(title);
        doc.insert("slug".to_string(), json!(slug));
    }
}

/// `"The Dark Knight: Rises"` -> `"the-dark-knight-rises"`
pub fn slugify(text: &str) -> String {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Computed fields added to every movie in responses
fn with_virtuals(mut movie: Document) -> Document {
    if let Some(minutes) = movie.get("duration").and_then(Value::as_f64) {
        let hours = (minutes / 60.0 * 10.0).round() / 10.0;
        movie.insert("durationInHours".to_string(), json!(hours));
    }
    movie
}
