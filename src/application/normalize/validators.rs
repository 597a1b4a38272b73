//! Scalar coercions for loosely-typed payload values.

use serde_json::Value;

/// Checkbox semantics: present and non-empty means on.
pub fn flag(value: &Value) -> bool {
    match value {
        Value::Bool(on) => *on,
        Value::Null => false,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => {
            let text = text.trim();
            !(text.is_empty()
                || text == "0"
                || text.eq_ignore_ascii_case("false")
                || text.eq_ignore_ascii_case("off"))
        }
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Strictly positive integer that fits `u32`.
pub fn positive_int(value: &Value) -> Option<u32> {
    whole_number(value).filter(|n| *n > 0)
}

/// Zero or positive integer that fits `u32`.
pub fn non_negative_int(value: &Value) -> Option<u32> {
    whole_number(value)
}

/// Text view of a scalar; containers and null read as empty.
pub fn text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) | Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}

fn whole_number(value: &Value) -> Option<u32> {
    let number = match value {
        Value::Number(number) => number
            .as_u64()
            .map(|n| n as f64)
            .or_else(|| number.as_f64())?,
        Value::String(text) => {
            let text = text.trim();
            match text.parse::<u64>() {
                Ok(n) => n as f64,
                Err(_) => text.parse::<f64>().ok()?,
            }
        }
        _ => return None,
    };

    (number.is_finite() && number.fract() == 0.0 && number >= 0.0 && number <= f64::from(u32::MAX))
        .then_some(number as u32)
}
