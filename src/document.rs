//! Source document representation and truthiness rules.
//!
//! Documents arrive from the source as nested JSON-like maps. Several
//! mapping rules treat "empty" values as absent, so the falsy set is
//! defined once here: `null`, `false`, zero, the empty string, the empty
//! array and the empty object.

use serde_json::{Map, Value};

/// A nested source document keyed by field name, in source order.
pub type Document = Map<String, Value>;

/// Name of the canonical identifier field carried by every document.
pub const ID_FIELD: &str = "_id";

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Returns the value only when it is present and truthy.
pub fn truthy(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| is_truthy(v))
}

/// Parses a single JSON object into a [`Document`].
pub fn document_from_json(value: Value) -> Option<Document> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}
