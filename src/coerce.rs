//! Coercion of resolved document values into record cells.
//!
//! Falsy values become the empty string for every declared kind. Numeric
//! kinds parse numbers, numeric strings and booleans; anything else is a
//! [`CoercionError`]. Text is rendered (arrays joined with `,`) and then
//! sanitized so no raw `\n`, `\r` or NUL reaches the sink.

use std::borrow::Cow;

use itertools::Itertools;
use serde_json::Value;
use thiserror::Error;

use crate::{document::is_truthy, record::RecordValue, schema::FieldKind};

pub const LIST_SEPARATOR: &str = ",";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot parse {value} as {expected}")]
pub struct CoercionError {
    pub value: String,
    pub expected: FieldKind,
}

impl CoercionError {
    fn new(value: &Value, expected: FieldKind) -> Self {
        Self {
            value: value.to_string(),
            expected,
        }
    }
}

pub fn coerce(raw: Option<&Value>, kind: FieldKind) -> Result<RecordValue, CoercionError> {
    match kind {
        FieldKind::Integer => match raw.filter(|v| is_truthy(v)) {
            Some(value) => parse_integer(value).map(RecordValue::Integer),
            None => Ok(RecordValue::empty()),
        },
        FieldKind::Number => match raw.filter(|v| is_truthy(v)) {
            Some(value) => parse_number(value).map(RecordValue::Number),
            None => Ok(RecordValue::empty()),
        },
        FieldKind::Text => Ok(RecordValue::Text(raw.map(text_value).unwrap_or_default())),
    }
}

pub fn parse_integer(value: &Value) -> Result<i64, CoercionError> {
    let parsed = match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|f| f.is_finite() && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                .map(|f| f.trunc() as i64)
        }),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        Value::Bool(flag) => Some(i64::from(*flag)),
        _ => None,
    };
    parsed.ok_or_else(|| CoercionError::new(value, FieldKind::Integer))
}

pub fn parse_number(value: &Value) -> Result<f64, CoercionError> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        _ => None,
    };
    parsed.ok_or_else(|| CoercionError::new(value, FieldKind::Number))
}

/// Replaces `\n`, `\r` and NUL with a single space, borrowing when clean.
pub fn sanitize_text(input: &str) -> Cow<'_, str> {
    if input.contains(['\n', '\r', '\0']) {
        Cow::Owned(input.replace(['\n', '\r', '\0'], " "))
    } else {
        Cow::Borrowed(input)
    }
}

/// Renders a value as unsanitized text; arrays join their rendered items.
pub fn render_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::Array(items) => items.iter().map(render_text).join(LIST_SEPARATOR),
        Value::Object(_) => value.to_string(),
    }
}

/// Renders and sanitizes a value as a text cell.
pub fn text_value(value: &Value) -> String {
    let rendered = render_text(value);
    match sanitize_text(&rendered) {
        Cow::Borrowed(_) => rendered,
        Cow::Owned(clean) => clean,
    }
}

/// Comma-joins already extracted strings into one sanitized cell.
pub fn join_text<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = items.into_iter().map(|item| item.as_ref().to_string()).join(LIST_SEPARATOR);
    sanitize_text(&joined).into_owned()
}

/// Carries a raw value into a record without a declared kind.
///
/// Integers stay integers, other numbers become reals, booleans pass
/// through, and everything else is rendered as sanitized text.
pub fn passthrough(value: &Value) -> RecordValue {
    match value {
        Value::Bool(flag) => RecordValue::Boolean(*flag),
        Value::Number(number) => match number.as_i64() {
            Some(i) => RecordValue::Integer(i),
            None => number
                .as_f64()
                .map(RecordValue::Number)
                .unwrap_or_else(|| RecordValue::Text(number.to_string())),
        },
        other => RecordValue::Text(text_value(other)),
    }
}
