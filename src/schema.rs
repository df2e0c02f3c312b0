//! Stream schemas: ordered field declarations loaded from Singer-style files.
//!
//! A schema file is a JSON (or YAML) object whose `properties` map declares
//! each output column in order:
//!
//! ```json
//! {"properties": {
//!     "_id": {"type": "string"},
//!     "advertiser_id": {"type": ["null", "string"]},
//!     "created_at": {"type": "string", "nested": false},
//!     "owner_name": {"type": "string", "path": ["owner", "fullName"]},
//!     "scores_overallScore": {"type": "integer"}
//! }}
//! ```
//!
//! `type` may be a string or an array; the first non-`null` entry decides
//! the [`FieldKind`]. `nested: false` and `path` override the underscore
//! path heuristic for that field.

use std::{
    collections::BTreeMap,
    fmt,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use log::debug;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{document::Document, path::FieldPath, stream::Stream};

const SCHEMA_EXTENSIONS: &[&str] = &["json", "yaml", "yml"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Number,
    Text,
}

impl FieldKind {
    pub fn from_type_name(name: &str) -> Self {
        match name {
            "integer" => FieldKind::Integer,
            "number" => FieldKind::Number,
            _ => FieldKind::Text,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FieldKind::Integer => "integer",
            FieldKind::Number => "number",
            FieldKind::Text => "string",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub path: FieldPath,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            path: FieldPath::Inferred,
        }
    }

    pub fn with_path(mut self, path: FieldPath) -> Self {
        self.path = path;
        self
    }

    pub fn resolve<'a>(&self, doc: &'a Document) -> Option<&'a Value> {
        self.path.resolve(&self.name, doc)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TypeDecl {
    One(String),
    Many(Vec<String>),
}

impl TypeDecl {
    fn kind(&self) -> FieldKind {
        match self {
            TypeDecl::One(name) => FieldKind::from_type_name(name),
            TypeDecl::Many(names) => names
                .iter()
                .find(|name| name.as_str() != "null")
                .map(|name| FieldKind::from_type_name(name))
                .unwrap_or(FieldKind::Text),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PropertyDecl {
    #[serde(rename = "type")]
    type_decl: Option<TypeDecl>,
    path: Option<Vec<String>>,
    nested: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<FieldSpec>,
    document: Value,
}

impl Schema {
    pub fn from_fields(fields: Vec<FieldSpec>) -> Self {
        let properties = fields
            .iter()
            .map(|field| {
                (
                    field.name.clone(),
                    serde_json::json!({ "type": ["null", field.kind.to_string()] }),
                )
            })
            .collect::<Map<String, Value>>();
        Self {
            fields,
            document: serde_json::json!({ "type": "object", "properties": properties }),
        }
    }

    pub fn from_value(document: Value) -> Result<Self> {
        let properties = document
            .get("properties")
            .and_then(Value::as_object)
            .ok_or_else(|| anyhow!("Schema is missing a 'properties' object"))?;
        let mut fields = Vec::with_capacity(properties.len());
        for (name, raw) in properties {
            let decl: PropertyDecl = serde_json::from_value(raw.clone())
                .with_context(|| format!("Parsing property '{name}'"))?;
            let kind = decl
                .type_decl
                .as_ref()
                .map(TypeDecl::kind)
                .unwrap_or(FieldKind::Text);
            let path = match (decl.path, decl.nested) {
                (Some(segments), _) if !segments.is_empty() => FieldPath::Explicit(segments),
                (_, Some(false)) => FieldPath::Flat,
                _ => FieldPath::Inferred,
            };
            fields.push(FieldSpec {
                name: name.clone(),
                kind,
                path,
            });
        }
        Ok(Self { fields, document })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening schema file {path:?}"))?;
        let reader = BufReader::new(file);
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
        let document: Value = if is_yaml {
            serde_yaml::from_reader(reader).with_context(|| format!("Parsing schema YAML {path:?}"))?
        } else {
            serde_json::from_reader(reader).with_context(|| format!("Parsing schema JSON {path:?}"))?
        };
        Self::from_value(document).with_context(|| format!("Reading schema {path:?}"))
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The schema document as loaded, for emitting alongside records.
    pub fn document(&self) -> &Value {
        &self.document
    }
}

/// Schemas for every stream that has a schema file in a directory.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    schemas: BTreeMap<Stream, Schema>,
}

impl SchemaCatalog {
    pub fn load_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(anyhow!("Schema directory {dir:?} does not exist"));
        }
        let mut schemas = BTreeMap::new();
        for stream in Stream::ALL {
            match schema_file(dir, stream) {
                Some(path) => {
                    let schema = Schema::load(&path)?;
                    debug!("Loaded {} field(s) for stream '{}'", schema.len(), stream);
                    schemas.insert(stream, schema);
                }
                None => debug!("No schema file for stream '{}' in {:?}", stream, dir),
            }
        }
        Ok(Self { schemas })
    }

    pub fn insert(&mut self, stream: Stream, schema: Schema) {
        self.schemas.insert(stream, schema);
    }

    pub fn get(&self, stream: Stream) -> Option<&Schema> {
        self.schemas.get(&stream)
    }

    pub fn streams(&self) -> impl Iterator<Item = Stream> + '_ {
        self.schemas.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

fn schema_file(dir: &Path, stream: Stream) -> Option<PathBuf> {
    SCHEMA_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{ext}", stream.as_str())))
        .find(|candidate| candidate.is_file())
}
