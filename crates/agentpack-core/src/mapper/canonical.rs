//! Canonical form of pack payloads
//!
//! One recursive normalization applies to every pack: object keys are
//! sorted lexicographically at every depth, array order is kept. Serialized
//! output is pretty JSON with a trailing newline, so identical input always
//! yields identical bytes regardless of incoming key order.

use crate::error::Result;
use serde_json::{Map, Value};

/// Deep-sort object keys; arrays keep their element order
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let sorted: Map<String, Value> = entries
                .into_iter()
                .map(|(k, v)| (k.clone(), canonicalize(v)))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        scalar => scalar.clone(),
    }
}

/// Serialize in canonical form
pub fn to_canonical_string(value: &Value) -> Result<String> {
    let mut text = serde_json::to_string_pretty(&canonicalize(value))?;
    text.push('\n');
    Ok(text)
}

/// blake3 hex digest of serialized pack bytes
pub fn digest(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}
