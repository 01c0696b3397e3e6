//! Small helpers shared across stores: deterministic JSON serialization (needed for
//! audit-hash stability) and ISO-8601 timestamp formatting.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

pub fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

pub fn to_iso(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// Serializes a JSON value with object keys sorted, NaN/Infinity replaced with null,
/// and no insignificant whitespace. This is the exact byte-string that gets hashed
/// into the audit chain and whose trailing whitespace is otherwise stripped, so the
/// same semantic payload always hashes identically regardless of insertion order.
pub fn canonical_json(value: &Value) -> String {
    let normalized = normalize(value);
    serde_json::to_string(&normalized).unwrap_or_else(|_| "null".to_string())
}

fn normalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted = Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for k in keys {
                sorted.insert(k.clone(), normalize(&map[k]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(normalize).collect()),
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                if !f.is_finite() {
                    return Value::Null;
                }
            }
            value.clone()
        }
        other => other.clone(),
    }
}

pub fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}
