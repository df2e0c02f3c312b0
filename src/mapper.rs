//! Schema-driven document to record mapping.

use std::sync::Arc;

use thiserror::Error;

use crate::{
    coerce::{CoercionError, coerce},
    document::Document,
    record::{Record, RecordValue},
    schema::Schema,
};

/// Column stamped onto every record with the configured platform name.
pub const PLATFORM_FIELD: &str = "platform";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("field '{field}': {source}")]
pub struct MappingError {
    pub field: String,
    #[source]
    pub source: CoercionError,
}

/// Turns one source document into one flat record.
pub trait RecordMapper: Send + Sync {
    fn map(&self, doc: &Document) -> Result<Record, MappingError>;

    /// Every column a mapped record can carry, in output order.
    fn columns(&self) -> Vec<String>;
}

#[derive(Debug, Clone)]
pub struct SchemaRecordMapper {
    schema: Arc<Schema>,
    platform: String,
}

impl SchemaRecordMapper {
    pub fn new(schema: Arc<Schema>, platform: impl Into<String>) -> Self {
        Self {
            schema,
            platform: platform.into(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

impl RecordMapper for SchemaRecordMapper {
    fn map(&self, doc: &Document) -> Result<Record, MappingError> {
        let mut record = Record::with_capacity(self.schema.len() + 1);
        for field in self.schema.fields() {
            let value = coerce(field.resolve(doc), field.kind).map_err(|source| MappingError {
                field: field.name.clone(),
                source,
            })?;
            record.set(field.name.clone(), value);
        }
        record.set(PLATFORM_FIELD, RecordValue::Text(self.platform.clone()));
        Ok(record)
    }

    fn columns(&self) -> Vec<String> {
        let mut columns = Vec::with_capacity(self.schema.len() + 1);
        for field in self.schema.fields() {
            if !columns.contains(&field.name) {
                columns.push(field.name.clone());
            }
        }
        if !columns.iter().any(|name| name == PLATFORM_FIELD) {
            columns.push(PLATFORM_FIELD.to_string());
        }
        columns
    }
}
