use std::fmt;

use serde::{Serialize, Serializer, ser::SerializeMap};

/// A single coerced output cell.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    Text(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
}

impl RecordValue {
    /// The absent value: an empty string.
    pub fn empty() -> Self {
        RecordValue::Text(String::new())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RecordValue::Text(text) if text.is_empty())
    }

    pub fn as_display(&self) -> String {
        match self {
            RecordValue::Text(text) => text.clone(),
            RecordValue::Integer(i) => i.to_string(),
            RecordValue::Number(f) => {
                if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
            RecordValue::Boolean(b) => b.to_string(),
        }
    }
}

impl Default for RecordValue {
    fn default() -> Self {
        RecordValue::empty()
    }
}

impl fmt::Display for RecordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<&str> for RecordValue {
    fn from(value: &str) -> Self {
        RecordValue::Text(value.to_string())
    }
}

impl From<String> for RecordValue {
    fn from(value: String) -> Self {
        RecordValue::Text(value)
    }
}

impl From<i64> for RecordValue {
    fn from(value: i64) -> Self {
        RecordValue::Integer(value)
    }
}

impl From<f64> for RecordValue {
    fn from(value: f64) -> Self {
        RecordValue::Number(value)
    }
}

impl From<bool> for RecordValue {
    fn from(value: bool) -> Self {
        RecordValue::Boolean(value)
    }
}

impl Serialize for RecordValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RecordValue::Text(text) => serializer.serialize_str(text),
            RecordValue::Integer(i) => serializer.serialize_i64(*i),
            RecordValue::Number(f) => serializer.serialize_f64(*f),
            RecordValue::Boolean(b) => serializer.serialize_bool(*b),
        }
    }
}

/// Flat output row keyed by column name, in insertion order.
///
/// Setting an existing column replaces its value without moving it, so the
/// schema's declaration order survives derived-column overrides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, RecordValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<RecordValue>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&RecordValue> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RecordValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_in_place_and_appends_new_columns() {
        let mut record = Record::new();
        record.set("a", "first");
        record.set("b", 2i64);
        record.set("a", "second");
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(record.get("a"), Some(&RecordValue::from("second")));
    }

    #[test]
    fn serializes_in_insertion_order() {
        let mut record = Record::new();
        record.set("zeta", "z");
        record.set("alpha", 1.5);
        record.set("flag", true);
        record.set("count", RecordValue::Integer(3));
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"zeta":"z","alpha":1.5,"flag":true,"count":3}"#);
    }

    #[test]
    fn display_drops_trailing_zero_fraction() {
        assert_eq!(RecordValue::Number(42.0).as_display(), "42");
        assert_eq!(RecordValue::Number(2.5).as_display(), "2.5");
        assert!(RecordValue::empty().is_empty());
        assert!(!RecordValue::Integer(0).is_empty());
    }
}
