use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::params::{FilterValue, ParamValue, QueryParams, ReservedKey};
use crate::config::FeaturesConfig;
use crate::types::Document;

/// Comparison operators accepted in `field[op]=value` query keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompareOp {
    Gte,
    Gt,
    Lte,
    Lt,
    /// Unrecognized token, handed to the store unchanged
    Other(String),
}

impl CompareOp {
    pub fn from_token(token: &str) -> Self {
        match token {
            "gte" => CompareOp::Gte,
            "gt" => CompareOp::Gt,
            "lte" => CompareOp::Lte,
            "lt" => CompareOp::Lt,
            other => CompareOp::Other(other.to_string()),
        }
    }

    /// Operator key understood by the stores (`gte` -> `$gte`)
    pub fn engine_token(&self) -> &str {
        match self {
            CompareOp::Gte => "$gte",
            CompareOp::Gt => "$gt",
            CompareOp::Lte => "$lte",
            CompareOp::Lt => "$lt",
            CompareOp::Other(token) => token,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Equals(FilterValue),
    Compare(Vec<(CompareOp, FilterValue)>),
}

impl Condition {
    fn to_engine_value(&self) -> Value {
        match self {
            Condition::Equals(FilterValue::One(value)) => Value::String(value.clone()),
            Condition::Equals(many @ FilterValue::Many(_)) => {
                let mut object = Map::new();
                object.insert("$in".to_string(), many.to_json());
                Value::Object(object)
            }
            Condition::Compare(comparisons) => {
                let mut object = Map::new();
                for (op, value) in comparisons {
                    object.insert(op.engine_token().to_string(), value.to_json());
                }
                Value::Object(object)
            }
        }
    }
}

/// Equality and comparison constraints derived from non-reserved query keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterClause {
    conditions: BTreeMap<String, Condition>,
}

impl FilterClause {
    pub fn from_params(params: &QueryParams) -> Self {
        let conditions = params
            .filter_entries()
            .map(|(field, value)| {
                let condition = match value {
                    ParamValue::Value(value) => Condition::Equals(value.clone()),
                    ParamValue::Nested(operators) => Condition::Compare(
                        operators
                            .iter()
                            .map(|(token, value)| (CompareOp::from_token(token), value.clone()))
                            .collect(),
                    ),
                };
                (field.to_string(), condition)
            })
            .collect();
        Self { conditions }
    }

    pub fn get(&self, field: &str) -> Option<&Condition> {
        self.conditions.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.conditions.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Render as the `$`-prefixed filter document the stores execute
    pub fn to_engine_filter(&self) -> Document {
        self.conditions
            .iter()
            .map(|(field, condition)| (field.clone(), condition.to_engine_value()))
            .collect()
    }
}

/// Resolved `page`/`limit` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
}

impl Pagination {
    /// Missing or non-numeric values take the defaults, values below 1 clamp to 1,
    /// and `limit` is capped at `max_limit`.
    pub fn from_params(params: &QueryParams, config: &FeaturesConfig) -> Self {
        let page = parse_count(params.control(ReservedKey::Page))
            .unwrap_or(config.default_page as i64)
            .max(1) as u64;

        let requested = parse_count(params.control(ReservedKey::Limit))
            .unwrap_or(config.default_limit as i64)
            .max(1) as u64;
        let max_limit = config.max_limit.max(1);
        let limit = if requested > max_limit {
            tracing::debug!("Limit {} exceeds max {}, capping to max", requested, max_limit);
            max_limit
        } else {
            requested
        };

        Self { page, limit }
    }

    pub fn skip(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

fn parse_count(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
}
