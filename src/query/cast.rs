//! Query-string values arrive as text. These helpers decide which typed
//! values a text operand may stand for when it meets a stored document.

use serde_json::{Number, Value};

/// Typed reading of a text operand: `"2001"` -> `2001`, `"7.5"` -> `7.5`,
/// `"true"` -> `true`. Anything else is returned unchanged.
pub fn cast_scalar(value: &Value) -> Value {
    let Value::String(text) = value else {
        return value.clone();
    };
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed != text {
        return value.clone();
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        return Value::Number(Number::from(int));
    }
    if let Ok(float) = trimmed.parse::<f64>() {
        if let Some(number) = Number::from_f64(float) {
            return Value::Number(number);
        }
    }
    match trimmed {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => value.clone(),
    }
}

/// Values an equality operand can match: the operand itself plus its typed reading
pub fn cast_candidates(value: &Value) -> Vec<Value> {
    let cast = cast_scalar(value);
    if cast == *value {
        vec![value.clone()]
    } else {
        vec![value.clone(), cast]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_and_boolean_text_is_cast() {
        assert_eq!(cast_scalar(&json!("2001")), json!(2001));
        assert_eq!(cast_scalar(&json!("7.5")), json!(7.5));
        assert_eq!(cast_scalar(&json!("false")), json!(false));
        assert_eq!(cast_scalar(&json!("Nolan")), json!("Nolan"));
        assert_eq!(cast_scalar(&json!(" 12")), json!(" 12"));
        assert_eq!(cast_scalar(&json!("NaN")), json!("NaN"));
    }

    #[test]
    fn candidates_keep_the_original_text() {
        assert_eq!(cast_candidates(&json!("2001")), vec![json!("2001"), json!(2001)]);
        assert_eq!(cast_candidates(&json!("Heat")), vec![json!("Heat")]);
        assert_eq!(cast_candidates(&json!(3)), vec![json!(3)]);
    }
}
