use serde_json::{Map, Value};

use super::error::FilterError;
use super::types::{FieldPath, FilterOp, FilterWhereInfo, LogicalOp};
use crate::query::cast::{cast_candidates, cast_scalar};

/// Compiles an engine filter document into a WHERE clause over a jsonb column.
///
/// Placeholders continue from `starting_param_index`, so a clause can be
/// embedded in a statement that already binds earlier parameters.
pub struct FilterWhere {
    column: String,
    param_values: Vec<Value>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(column: impl Into<String>, starting_param_index: usize) -> Self {
        Self {
            column: column.into(),
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    pub fn generate(
        where_data: &Map<String, Value>,
        column: &str,
        starting_param_index: usize,
    ) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = Self::new(column, starting_param_index);
        let clause = filter_where.build(where_data)?;
        Ok((clause, filter_where.param_values))
    }

    fn build(&mut self, where_data: &Map<String, Value>) -> Result<String, FilterError> {
        let parts = self.parse_where_data(where_data)?;
        Ok(if parts.is_empty() { "1=1".to_string() } else { parts.join(" AND ") })
    }

    fn parse_where_data(&mut self, where_data: &Map<String, Value>) -> Result<Vec<String>, FilterError> {
        let mut sql_conditions = vec![];
        for (key, value) in where_data {
            if key.starts_with('$') {
                sql_conditions.push(self.parse_logical_operator(key, value)?);
            } else {
                for condition in Self::parse_field_condition(key, value)? {
                    sql_conditions.push(self.build_sql_condition(&condition)?);
                }
            }
        }
        Ok(sql_conditions)
    }

    fn parse_logical_operator(&mut self, key: &str, value: &Value) -> Result<String, FilterError> {
        match LogicalOp::from_key(key)? {
            op @ (LogicalOp::And | LogicalOp::Or) => {
                let branches = value
                    .as_array()
                    .filter(|arr| !arr.is_empty())
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires a non-empty array", key)))?;
                let mut sql_parts = Vec::with_capacity(branches.len());
                for branch in branches {
                    let object = branch
                        .as_object()
                        .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} entries must be objects", key)))?;
                    sql_parts.push(format!("({})", self.build(object)?));
                }
                let joiner = if op == LogicalOp::And { " AND " } else { " OR " };
                Ok(format!("({})", sql_parts.join(joiner)))
            }
            LogicalOp::Not => {
                let object = value
                    .as_object()
                    .ok_or_else(|| FilterError::InvalidOperatorData("$not requires an object".to_string()))?;
                Ok(format!("NOT ({})", self.build(object)?))
            }
        }
    }

    /// Object values are operator objects; anything else is implicit equality
    fn parse_field_condition(field: &str, value: &Value) -> Result<Vec<FilterWhereInfo>, FilterError> {
        match value {
            Value::Object(operators) if !operators.is_empty() => operators
                .iter()
                .map(|(op_key, op_val)| {
                    Ok(FilterWhereInfo {
                        field: field.to_string(),
                        operator: FilterOp::from_key(op_key)?,
                        data: op_val.clone(),
                    })
                })
                .collect(),
            _ => Ok(vec![FilterWhereInfo {
                field: field.to_string(),
                operator: FilterOp::Eq,
                data: value.clone(),
            }]),
        }
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> Result<String, FilterError> {
        let path = FieldPath::parse(&condition.field)?;
        let expr = path.to_sql(&self.column);

        match condition.operator {
            FilterOp::Eq => {
                if condition.data.is_null() {
                    Ok(format!("({expr} IS NULL OR {expr} = 'null'::jsonb)"))
                } else {
                    Ok(self.any_match(&expr, cast_candidates(&condition.data)))
                }
            }
            FilterOp::Ne => {
                if condition.data.is_null() {
                    Ok(format!("({expr} IS NOT NULL AND {expr} <> 'null'::jsonb)"))
                } else {
                    Ok(format!("NOT {}", self.any_match(&expr, cast_candidates(&condition.data))))
                }
            }
            FilterOp::In | FilterOp::NIn => {
                let values = condition.data.as_array().ok_or_else(|| {
                    FilterError::InvalidOperatorData(format!("{:?} requires an array", condition.operator))
                })?;
                let negate = condition.operator == FilterOp::NIn;
                if values.is_empty() {
                    return Ok(if negate { "1=1" } else { "1=0" }.to_string());
                }
                let candidates = values.iter().flat_map(cast_candidates).collect();
                let sql = self.any_match(&expr, candidates);
                Ok(if negate { format!("NOT {}", sql) } else { sql })
            }
            FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => {
                if !matches!(condition.data, Value::String(_) | Value::Number(_) | Value::Bool(_)) {
                    return Err(FilterError::InvalidOperatorData(format!(
                        "{:?} requires a single scalar value",
                        condition.operator
                    )));
                }
                let sql_op = condition.operator.range_sql().unwrap_or("=");
                let param = self.param(cast_scalar(&condition.data));
                // Array fields match when any element satisfies the bound
                Ok(format!(
                    "EXISTS (SELECT 1 FROM jsonb_array_elements(CASE WHEN jsonb_typeof({expr}) = 'array' THEN {expr} ELSE jsonb_build_array({expr}) END) AS e(value) WHERE jsonb_typeof(e.value) = jsonb_typeof({param}) AND e.value {sql_op} {param})"
                ))
            }
            FilterOp::Exists => {
                let wanted = match &condition.data {
                    Value::Bool(b) => *b,
                    other => cast_scalar(other) != Value::Bool(false),
                };
                Ok(format!("{} IS {}NULL", expr, if wanted { "NOT " } else { "" }))
            }
        }
    }

    /// True when the field contains any candidate; array fields contain their elements
    fn any_match(&mut self, expr: &str, candidates: Vec<Value>) -> String {
        let param = self.param(Value::Array(candidates));
        format!("EXISTS (SELECT 1 FROM jsonb_array_elements({param}) AS c(value) WHERE {expr} @> c.value)")
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}
