//! Flat field name to nested value resolution.
//!
//! A schema field such as `customer_id` addresses `customer._id` inside the
//! document: the name is split on `_`, empty segments are dropped and the
//! segment `id` stands for the identifier field. Walking stops as soon as an
//! intermediate value is missing or falsy, and the field is then absent.
//!
//! Because the underscore heuristic cannot tell a nested path from a flat key
//! that merely contains `_`, a schema may pin a field to [`FieldPath::Flat`]
//! or spell out its path with [`FieldPath::Explicit`].

use serde_json::Value;

use crate::document::{Document, ID_FIELD, is_truthy};

pub const PATH_SEPARATOR: char = '_';

const ID_SEGMENT: &str = "id";

/// How a schema field locates its value inside a document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldPath {
    /// Infer nesting from the underscores in the field name.
    #[default]
    Inferred,
    /// Read the field name as a single top-level key.
    Flat,
    /// Walk these literal keys in order.
    Explicit(Vec<String>),
}

impl FieldPath {
    pub fn resolve<'a>(&self, field_name: &str, doc: &'a Document) -> Option<&'a Value> {
        match self {
            FieldPath::Inferred => get_property(field_name, doc),
            FieldPath::Flat => doc.get(field_name),
            FieldPath::Explicit(segments) => walk_path(doc, segments),
        }
    }
}

/// Resolves `field_name` against `doc` using the underscore heuristic.
///
/// Returns `None` when any segment is missing or an intermediate value is
/// falsy; callers render that as the empty string.
pub fn get_property<'a>(field_name: &str, doc: &'a Document) -> Option<&'a Value> {
    if field_name == ID_FIELD || !field_name.contains(PATH_SEPARATOR) {
        return doc.get(field_name);
    }
    walk_path(doc, &path_segments(field_name))
}

/// Splits a flat field name into document keys.
pub fn path_segments(field_name: &str) -> Vec<&str> {
    field_name
        .split(PATH_SEPARATOR)
        .filter(|segment| !segment.is_empty())
        .map(|segment| if segment == ID_SEGMENT { ID_FIELD } else { segment })
        .collect()
}

pub fn walk_path<'a, S: AsRef<str>>(doc: &'a Document, segments: &[S]) -> Option<&'a Value> {
    let (last, parents) = segments.split_last()?;
    let mut current = doc;
    for segment in parents {
        match current.get(segment.as_ref()) {
            Some(Value::Object(inner)) if !inner.is_empty() => current = inner,
            _ => return None,
        }
    }
    current.get(last.as_ref()).filter(|value| is_truthy(value))
}
