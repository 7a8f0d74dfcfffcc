/// Shared types used across the codebase

use serde_json::{Map, Value};

/// A stored document: a JSON object keyed by field name
pub type Document = Map<String, Value>;

/// Identity field present on every stored document
pub const ID_FIELD: &str = "_id";

/// Creation timestamp, RFC 3339 in UTC
pub const CREATED_AT_FIELD: &str = "createdAt";

/// Version counter, internal to the store
pub const VERSION_FIELD: &str = "__v";

/// System fields that can only be set by the store, not by API input
pub const SYSTEM_FIELDS: &[&str] = &[ID_FIELD, CREATED_AT_FIELD, VERSION_FIELD];

/// Build a single-field document, e.g. `doc_of("_id", json!(id))`
pub fn doc_of(field: &str, value: Value) -> Document {
    let mut doc = Document::new();
    doc.insert(field.to_string(), value);
    doc
}
