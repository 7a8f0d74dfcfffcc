use std::collections::BTreeMap;

use serde_json::Value;
use url::form_urlencoded;

/// Query-string keys that shape the query instead of filtering it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservedKey {
    Page,
    Sort,
    Limit,
    Fields,
}

impl ReservedKey {
    pub const ALL: [ReservedKey; 4] = [
        ReservedKey::Page,
        ReservedKey::Sort,
        ReservedKey::Limit,
        ReservedKey::Fields,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReservedKey::Page => "page",
            ReservedKey::Sort => "sort",
            ReservedKey::Limit => "limit",
            ReservedKey::Fields => "fields",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|reserved| reserved.as_str() == key)
    }
}

/// A query-string value: a single string, or every value of a repeated key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    One(String),
    Many(Vec<String>),
}

impl FilterValue {
    fn push(self, value: String) -> Self {
        match self {
            FilterValue::One(first) => FilterValue::Many(vec![first, value]),
            FilterValue::Many(mut values) => {
                values.push(value);
                FilterValue::Many(values)
            }
        }
    }

    /// First value; repeated control keys use the first occurrence
    pub fn first(&self) -> Option<&str> {
        match self {
            FilterValue::One(value) => Some(value),
            FilterValue::Many(values) => values.first().map(String::as_str),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FilterValue::One(value) => Value::String(value.clone()),
            FilterValue::Many(values) => {
                Value::Array(values.iter().cloned().map(Value::String).collect())
            }
        }
    }
}

/// Value stored under a top-level key. `price[gte]=100` produces
/// `Nested({"gte": One("100")})` under `price`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Value(FilterValue),
    Nested(BTreeMap<String, FilterValue>),
}

/// Decoded query-string parameters of one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    entries: BTreeMap<String, ParamValue>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw (still percent-encoded) query string such as
    /// `year[gte]=2000&sort=-year,title&page=2`
    pub fn parse(raw: &str) -> Self {
        Self::from_pairs(form_urlencoded::parse(raw.as_bytes()).into_owned())
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut params = Self::new();
        for (key, value) in pairs {
            params.insert(key, value);
        }
        params
    }

    /// Add one key/value pair, accumulating repeated keys
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();

        if let Some((field, operator)) = split_bracket_key(&key) {
            let entry = self
                .entries
                .entry(field.to_string())
                .or_insert_with(|| ParamValue::Nested(BTreeMap::new()));
            if let ParamValue::Value(_) = entry {
                tracing::debug!("Query key '{}' redefined as an operator object", field);
                *entry = ParamValue::Nested(BTreeMap::new());
            }
            if let ParamValue::Nested(operators) = entry {
                let merged = match operators.remove(operator) {
                    Some(existing) => existing.push(value),
                    None => FilterValue::One(value),
                };
                operators.insert(operator.to_string(), merged);
            }
            return;
        }

        let merged = match self.entries.remove(&key) {
            Some(ParamValue::Value(existing)) => existing.push(value),
            Some(ParamValue::Nested(_)) => {
                tracing::debug!("Query key '{}' redefined as a plain value", key);
                FilterValue::One(value)
            }
            None => FilterValue::One(value),
        };
        self.entries.insert(key, ParamValue::Value(merged));
    }

    /// Replace whatever is stored under `key` with a single value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries
            .insert(key.into(), ParamValue::Value(FilterValue::One(value.into())));
    }

    /// Copy of these parameters with the given keys forced to fixed values
    pub fn with_overrides(&self, overrides: &[(&str, &str)]) -> Self {
        let mut params = self.clone();
        for (key, value) in overrides {
            params.set(*key, *value);
        }
        params
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.get(key)
    }

    /// String value of a control key. Operator objects under a control key are ignored.
    pub fn control(&self, key: ReservedKey) -> Option<&str> {
        match self.entries.get(key.as_str())? {
            ParamValue::Value(value) => value.first(),
            ParamValue::Nested(_) => None,
        }
    }

    /// Entries that are not reserved control keys, in key order
    pub fn filter_entries(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries
            .iter()
            .filter(|(key, _)| ReservedKey::from_key(key).is_none())
            .map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Split `field[op]` into `("field", "op")`. Only one bracket level is recognized;
/// anything else is treated as a literal key.
fn split_bracket_key(key: &str) -> Option<(&str, &str)> {
    let open = key.find('[')?;
    if open == 0 || !key.ends_with(']') {
        return None;
    }
    let field = &key[..open];
    let operator = &key[open + 1..key.len() - 1];
    if operator.is_empty() || operator.contains('[') || operator.contains(']') {
        return None;
    }
    Some((field, operator))
}
