pub mod cast;
pub mod types;

pub use types::{Projection, SortDirection, SortField};

use serde::Serialize;
use serde_json::Value;

use crate::types::Document;

/// A not-yet-executed collection read that can be refined step by step.
///
/// Refinements only describe the read; executing it is the caller's job.
pub trait CollectionQuery {
    /// Add filter constraints. Later constraints on the same field win,
    /// except operator objects which are merged.
    fn find(&mut self, filter: Document) -> &mut Self;

    /// Replace the sort order
    fn sort(&mut self, fields: Vec<SortField>) -> &mut Self;

    /// Replace the projection
    fn select(&mut self, projection: Projection) -> &mut Self;

    fn skip(&mut self, count: u64) -> &mut Self;

    fn limit(&mut self, count: u64) -> &mut Self;
}

/// Plain-data query description executed by a `DocumentStore`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FindQuery {
    pub filter: Document,
    pub sort: Vec<SortField>,
    pub projection: Projection,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl FindQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matching(filter: Document) -> Self {
        Self { filter, ..Self::default() }
    }
}

impl CollectionQuery for FindQuery {
    fn find(&mut self, filter: Document) -> &mut Self {
        for (field, incoming) in filter {
            let merged = match (self.filter.get_mut(&field), &incoming) {
                (Some(Value::Object(existing)), Value::Object(operators))
                    if is_operator_object(existing) && is_operator_object(operators) =>
                {
                    existing.extend(operators.clone());
                    true
                }
                _ => false,
            };
            if !merged {
                self.filter.insert(field, incoming);
            }
        }
        self
    }

    fn sort(&mut self, fields: Vec<SortField>) -> &mut Self {
        self.sort = fields;
        self
    }

    fn select(&mut self, projection: Projection) -> &mut Self {
        self.projection = projection;
        self
    }

    fn skip(&mut self, count: u64) -> &mut Self {
        self.skip = count;
        self
    }

    fn limit(&mut self, count: u64) -> &mut Self {
        self.limit = Some(count);
        self
    }
}

/// `{"$gte": 1, "$lt": 5}` style object
pub fn is_operator_object(object: &serde_json::Map<String, Value>) -> bool {
    !object.is_empty() && object.keys().all(|k| k.starts_with('$'))
}
