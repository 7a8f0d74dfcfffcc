use std::cmp::Ordering;

use serde_json::{Map, Value};

use super::store::StoreError;
use crate::filter::{FieldPath, FilterOp, LogicalOp};
use crate::query::cast::{cast_candidates, cast_scalar};
use crate::query::{FindQuery, SortDirection, SortField};
use crate::types::Document;

/// Compiled form of an engine filter document
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    True,
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    /// Field is missing or JSON null
    Null { path: Vec<String> },
    /// Field equals, or as an array contains, any candidate
    AnyOf { path: Vec<String>, values: Vec<Value> },
    Cmp { path: Vec<String>, op: FilterOp, value: Value },
    Exists { path: Vec<String>, exists: bool },
}

impl Predicate {
    pub fn compile(filter: &Map<String, Value>) -> Result<Self, StoreError> {
        let mut parts = Vec::with_capacity(filter.len());
        for (key, value) in filter {
            if key.starts_with('$') {
                parts.push(Self::compile_logical(key, value)?);
            } else {
                let path = FieldPath::parse(key)?.segments().to_vec();
                parts.extend(Self::compile_field(path, value)?);
            }
        }
        Ok(match parts.len() {
            0 => Predicate::True,
            1 => parts.remove(0),
            _ => Predicate::And(parts),
        })
    }

    fn compile_logical(key: &str, value: &Value) -> Result<Self, StoreError> {
        let op = LogicalOp::from_key(key)?;
        if op == LogicalOp::Not {
            let object = value
                .as_object()
                .ok_or_else(|| StoreError::InvalidQuery("$not requires an object".to_string()))?;
            return Ok(Predicate::Not(Box::new(Self::compile(object)?)));
        }

        let branches = value
            .as_array()
            .filter(|arr| !arr.is_empty())
            .ok_or_else(|| StoreError::InvalidQuery(format!("{} requires a non-empty array", key)))?;
        let compiled = branches
            .iter()
            .map(|branch| {
                branch
                    .as_object()
                    .ok_or_else(|| StoreError::InvalidQuery(format!("{} entries must be objects", key)))
                    .and_then(Self::compile)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(if op == LogicalOp::And { Predicate::And(compiled) } else { Predicate::Or(compiled) })
    }

    fn compile_field(path: Vec<String>, value: &Value) -> Result<Vec<Self>, StoreError> {
        let operators = match value {
            Value::Object(operators) if !operators.is_empty() => operators,
            _ => return Ok(vec![Self::equals(path, value)]),
        };

        let mut out = Vec::with_capacity(operators.len());
        for (key, data) in operators {
            let op = FilterOp::from_key(key)?;
            let predicate = match op {
                FilterOp::Eq => Self::equals(path.clone(), data),
                FilterOp::Ne => Predicate::Not(Box::new(Self::equals(path.clone(), data))),
                FilterOp::In | FilterOp::NIn => {
                    let values = data
                        .as_array()
                        .ok_or_else(|| StoreError::InvalidQuery(format!("{} requires an array", key)))?;
                    let any_of = Predicate::AnyOf {
                        path: path.clone(),
                        values: values.iter().flat_map(cast_candidates).collect(),
                    };
                    if op == FilterOp::NIn { Predicate::Not(Box::new(any_of)) } else { any_of }
                }
                FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => {
                    if !matches!(data, Value::String(_) | Value::Number(_) | Value::Bool(_)) {
                        return Err(StoreError::InvalidQuery(format!("{} requires a single scalar value", key)));
                    }
                    Predicate::Cmp { path: path.clone(), op, value: cast_scalar(data) }
                }
                FilterOp::Exists => {
                    let exists = match data {
                        Value::Bool(b) => *b,
                        other => cast_scalar(other) != Value::Bool(false),
                    };
                    Predicate::Exists { path: path.clone(), exists }
                }
            };
            out.push(predicate);
        }
        Ok(out)
    }

    fn equals(path: Vec<String>, value: &Value) -> Self {
        if value.is_null() {
            Predicate::Null { path }
        } else {
            Predicate::AnyOf { path, values: cast_candidates(value) }
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Predicate::True => true,
            Predicate::And(ps) => ps.iter().all(|p| p.matches(doc)),
            Predicate::Or(ps) => ps.iter().any(|p| p.matches(doc)),
            Predicate::Not(p) => !p.matches(doc),
            Predicate::Null { path } => get_path(doc, path).map_or(true, Value::is_null),
            Predicate::AnyOf { path, values } => get_path(doc, path).is_some_and(|v| {
                values.iter().any(|candidate| {
                    values_equal(v, candidate)
                        || v.as_array().is_some_and(|items| items.iter().any(|item| values_equal(item, candidate)))
                })
            }),
            Predicate::Cmp { path, op, value } => get_path(doc, path).is_some_and(|v| match v {
                Value::Array(items) => items.iter().any(|item| satisfies(item, *op, value)),
                single => satisfies(single, *op, value),
            }),
            Predicate::Exists { path, exists } => get_path(doc, path).is_some() == *exists,
        }
    }
}

/// Reject sort, projection and filter shapes no store can run
pub fn check_query(query: &FindQuery) -> Result<Predicate, StoreError> {
    if query.projection.is_mixed() {
        return Err(StoreError::InvalidProjection("Cannot mix field inclusion and exclusion".to_string()));
    }
    for field in query.projection.include().iter().chain(query.projection.exclude()) {
        FieldPath::parse(field)?;
    }
    for sort in &query.sort {
        FieldPath::parse(&sort.field)?;
    }
    Predicate::compile(&query.filter)
}

fn satisfies(candidate: &Value, op: FilterOp, bound: &Value) -> bool {
    if !same_kind(candidate, bound) {
        return false;
    }
    let ord = compare_values(candidate, bound);
    match op {
        FilterOp::Gt => ord == Ordering::Greater,
        FilterOp::Gte => ord != Ordering::Less,
        FilterOp::Lt => ord == Ordering::Less,
        FilterOp::Lte => ord != Ordering::Greater,
        _ => false,
    }
}

fn same_kind(a: &Value, b: &Value) -> bool {
    matches!(
        (a, b),
        (Value::Number(_), Value::Number(_)) | (Value::String(_), Value::String(_)) | (Value::Bool(_), Value::Bool(_))
    )
}

pub fn get_path<'a>(doc: &'a Document, path: &[String]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut current = doc.get(first)?;
    for segment in rest {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

/// Total order across JSON kinds: null < string < number < bool < array < object
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y) {
                let ord = compare_values(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::String(_) => 1,
        Value::Number(_) => 2,
        Value::Bool(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Missing fields sort lowest, before explicit nulls
pub fn compare_docs(a: &Document, b: &Document, sort: &[SortField]) -> Ordering {
    for s in sort {
        let path: Vec<String> = s.field.split('.').map(str::to_string).collect();
        let ord = match (get_path(a, &path), get_path(b, &path)) {
            (Some(x), Some(y)) => compare_values(x, y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return match s.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
        }
    }
    Ordering::Equal
}
