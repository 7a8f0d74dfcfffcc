use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use super::eval::{check_query, compare_docs, values_equal, Predicate};
use super::store::{DocumentStore, StoreError};
use crate::query::FindQuery;
use crate::types::{Document, ID_FIELD};

/// In-process document store. Collections keep insertion order, which also
/// breaks ties between documents that sort equal.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
    unique_fields: HashMap<String, Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject a second document holding the same value in `field`
    pub fn with_unique_field(mut self, collection: &str, field: &str) -> Self {
        self.unique_fields
            .entry(collection.to_string())
            .or_default()
            .push(field.to_string());
        self
    }

    fn unique_fields(&self, collection: &str) -> &[String] {
        self.unique_fields.get(collection).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First unique-field clash between `candidate` and the other documents
    fn find_duplicate(&self, collection: &str, docs: &[Document], candidate: &Document, skip: Option<usize>) -> Option<StoreError> {
        for field in self.unique_fields(collection) {
            let Some(value) = candidate.get(field).filter(|v| !v.is_null()) else {
                continue;
            };
            let clash = docs
                .iter()
                .enumerate()
                .filter(|(index, _)| Some(*index) != skip)
                .any(|(_, doc)| doc.get(field).is_some_and(|existing| values_equal(existing, value)));
            if clash {
                return Some(StoreError::DuplicateKey {
                    field: field.clone(),
                    value: display_value(value),
                });
            }
        }
        None
    }

    fn matching_indices(docs: &[Document], query: &FindQuery, predicate: &Predicate) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..docs.len()).filter(|&i| predicate.matches(&docs[i])).collect();
        if !query.sort.is_empty() {
            indices.sort_by(|&a, &b| compare_docs(&docs[a], &docs[b], &query.sort));
        }
        indices
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>, StoreError> {
        let predicate = check_query(query)?;
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(vec![]);
        };

        let skip = usize::try_from(query.skip).unwrap_or(usize::MAX);
        let limit = query
            .limit
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);

        let found: Vec<Document> = Self::matching_indices(docs, query, &predicate)
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|i| query.projection.apply(&docs[i]))
            .collect();
        debug!("memory find on {} returned {} documents", collection, found.len());
        Ok(found)
    }

    async fn count(&self, collection: &str, query: &FindQuery) -> Result<u64, StoreError> {
        let predicate = check_query(query)?;
        let collections = self.collections.read().await;
        let count = collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| predicate.matches(d)).count())
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn insert_one(&self, collection: &str, doc: Document) -> Result<Document, StoreError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();

        if let Some(id) = doc.get(ID_FIELD) {
            if docs.iter().any(|d| d.get(ID_FIELD) == Some(id)) {
                return Err(StoreError::DuplicateKey {
                    field: ID_FIELD.to_string(),
                    value: display_value(id),
                });
            }
        }
        if let Some(err) = self.find_duplicate(collection, docs, &doc, None) {
            return Err(err);
        }

        docs.push(doc.clone());
        Ok(doc)
    }

    async fn update_one(
        &self,
        collection: &str,
        query: &FindQuery,
        patch: Document,
    ) -> Result<Option<Document>, StoreError> {
        let predicate = check_query(query)?;
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(None);
        };
        let Some(index) = Self::matching_indices(docs, query, &predicate).into_iter().next() else {
            return Ok(None);
        };

        let mut updated = docs[index].clone();
        updated.extend(patch);
        if let Some(err) = self.find_duplicate(collection, docs, &updated, Some(index)) {
            return Err(err);
        }
        docs[index] = updated.clone();
        Ok(Some(updated))
    }

    async fn delete_one(&self, collection: &str, query: &FindQuery) -> Result<Option<Document>, StoreError> {
        let predicate = check_query(query)?;
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(None);
        };
        let index = Self::matching_indices(docs, query, &predicate).into_iter().next();
        Ok(index.map(|i| docs.remove(i)))
    }

    async fn delete_many(&self, collection: &str, query: &FindQuery) -> Result<u64, StoreError> {
        let predicate = check_query(query)?;
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|d| !predicate.matches(d));
        Ok((before - docs.len()) as u64)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
