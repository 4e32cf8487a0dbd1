//! Recursive removal of empty values before a payload is emitted.
//!
//! The target API rejects `null` and empty containers, so optional fields are left out
//! entirely. Children are pruned first: an object whose only field was empty becomes
//! `{}` and is removed in turn.

use serde_json::{Map, Value};

/// Whether a value is empty: `null`, `""`, `[]` or `{}`.
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Strip empty values from a document, bottom-up.
pub fn prune(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(prune_map(map)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(prune)
                .filter(|v| !is_empty(v))
                .collect(),
        ),
        other => other,
    }
}

/// [`prune`] for an object body.
pub fn prune_map(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .map(|(k, v)| (k, prune(v)))
        .filter(|(_, v)| !is_empty(v))
        .collect()
}
