//! Lenient scalar coercion for raw config values.
//!
//! Config files arrive hand-edited; booleans show up as `"yes"` or `1`,
//! numbers as quoted strings. Coercion never fails, it falls back to the
//! caller's default.

use serde_json::Value;

const TRUTHY: &[&str] = &["1", "true", "yes", "on", "y", "t"];
const FALSY: &[&str] = &["0", "false", "no", "off", "n", "f"];

pub(crate) fn coerce_bool(value: Option<&Value>, default: bool) -> bool {
    match value {
        None | Some(Value::Null) => default,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(default),
        Some(Value::String(s)) => {
            let norm = s.trim().to_ascii_lowercase();
            if TRUTHY.contains(&norm.as_str()) {
                true
            } else if FALSY.contains(&norm.as_str()) {
                false
            } else {
                default
            }
        }
        Some(_) => default,
    }
}

pub(crate) fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

pub(crate) fn coerce_u64(value: Option<&Value>) -> Option<u64> {
    let value = value?;
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}
