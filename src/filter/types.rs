use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::FilterError;

/// Operators accepted in an engine filter document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "$eq")] Eq,
    #[serde(rename = "$ne")] Ne,
    #[serde(rename = "$gt")] Gt,
    #[serde(rename = "$gte")] Gte,
    #[serde(rename = "$lt")] Lt,
    #[serde(rename = "$lte")] Lte,

    #[serde(rename = "$in")] In,
    #[serde(rename = "$nin")] NIn,

    #[serde(rename = "$exists")] Exists,
}

impl FilterOp {
    pub fn from_key(key: &str) -> Result<Self, FilterError> {
        Ok(match key {
            "$eq" => FilterOp::Eq,
            "$ne" | "$neq" => FilterOp::Ne,
            "$gt" => FilterOp::Gt,
            "$gte" => FilterOp::Gte,
            "$lt" => FilterOp::Lt,
            "$lte" => FilterOp::Lte,
            "$in" => FilterOp::In,
            "$nin" => FilterOp::NIn,
            "$exists" => FilterOp::Exists,
            other => return Err(FilterError::UnsupportedOperator(other.to_string())),
        })
    }

    /// SQL comparison for the range operators
    pub fn range_sql(&self) -> Option<&'static str> {
        match self {
            FilterOp::Gt => Some(">"),
            FilterOp::Gte => Some(">="),
            FilterOp::Lt => Some("<"),
            FilterOp::Lte => Some("<="),
            _ => None,
        }
    }
}

/// Logical combinators at the top of a filter document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Not,
}

impl LogicalOp {
    pub fn from_key(key: &str) -> Result<Self, FilterError> {
        match key {
            "$and" => Ok(LogicalOp::And),
            "$or" => Ok(LogicalOp::Or),
            "$not" => Ok(LogicalOp::Not),
            other => Err(FilterError::UnsupportedOperator(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilterWhereInfo {
    pub field: String,
    pub operator: FilterOp,
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Value>,
}

/// Validated document field path, `title` or `ratings.imdb`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn parse(field: &str) -> Result<Self, FilterError> {
        let segments: Vec<String> = field.split('.').map(str::to_string).collect();
        for segment in &segments {
            let valid_start = segment
                .chars()
                .next()
                .map(|c| c.is_ascii_alphabetic() || c == '_')
                .unwrap_or(false);
            if !valid_start || !segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(FilterError::InvalidField(field.to_string()));
            }
        }
        Ok(Self(segments))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// jsonb expression reading this path out of `column`
    pub fn to_sql(&self, column: &str) -> String {
        match self.0.as_slice() {
            [single] => format!("\"{}\" -> '{}'", column, single),
            segments => format!("\"{}\" #> '{{{}}}'", column, segments.join(",")),
        }
    }
}
