//! MongoDB-backed [`DocumentSource`].
//!
//! Every call that talks to the server builds its own client from the
//! connection string, so scan workers never share a connection.

use mongodb::{
    bson::{Bson, Document as BsonDocument, doc},
    sync::Client,
};
use serde_json::{Map, Value};

use crate::{
    document::Document,
    source::{DocumentSource, DocumentStream, SourceConnection, SourceError},
};

#[derive(Debug, Clone)]
pub struct MongoSource {
    uri: String,
    database: String,
}

impl MongoSource {
    pub fn new(uri: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: database.into(),
        }
    }

    fn client(&self) -> Result<Client, SourceError> {
        Client::with_uri_str(&self.uri).map_err(|err| SourceError::Connect(err.to_string()))
    }
}

impl DocumentSource for MongoSource {
    fn estimated_count(&self, collection: &str) -> Result<u64, SourceError> {
        self.client()?
            .database(&self.database)
            .collection::<BsonDocument>(collection)
            .estimated_document_count()
            .run()
            .map_err(|err| query_error(collection, err))
    }

    fn connect(&self) -> Result<Box<dyn SourceConnection>, SourceError> {
        Ok(Box::new(MongoConnection {
            client: self.client()?,
            database: self.database.clone(),
        }))
    }
}

struct MongoConnection {
    client: Client,
    database: String,
}

impl SourceConnection for MongoConnection {
    fn scan(
        &mut self,
        collection: &str,
        skip: u64,
        limit: u64,
    ) -> Result<DocumentStream<'_>, SourceError> {
        // A zero limit means "no limit" to the server.
        if limit == 0 {
            return Ok(Box::new(std::iter::empty()));
        }
        let cursor = self
            .client
            .database(&self.database)
            .collection::<BsonDocument>(collection)
            .find(doc! {})
            .skip(skip)
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .run()
            .map_err(|err| query_error(collection, err))?;
        let collection = collection.to_string();
        Ok(Box::new(cursor.map(move |item| {
            item.map(bson_document_to_json)
                .map_err(|err| query_error(&collection, err))
        })))
    }
}

fn query_error(collection: &str, err: mongodb::error::Error) -> SourceError {
    SourceError::Query {
        collection: collection.to_string(),
        message: err.to_string(),
    }
}

pub fn bson_document_to_json(document: BsonDocument) -> Document {
    document
        .into_iter()
        .map(|(key, value)| (key, bson_to_json(value)))
        .collect::<Map<String, Value>>()
}

/// Converts BSON into plain JSON, flattening identifiers and dates to text.
pub fn bson_to_json(value: Bson) -> Value {
    match value {
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(dt) => dt
            .try_to_rfc3339_string()
            .map(Value::String)
            .unwrap_or_else(|_| Value::from(dt.timestamp_millis())),
        Bson::Document(inner) => Value::Object(bson_document_to_json(inner)),
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_json).collect()),
        Bson::String(text) => Value::String(text),
        Bson::Boolean(flag) => Value::Bool(flag),
        Bson::Int32(i) => Value::from(i),
        Bson::Int64(i) => Value::from(i),
        Bson::Double(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Bson::Decimal128(decimal) => Value::String(decimal.to_string()),
        Bson::Null | Bson::Undefined => Value::Null,
        other => other.into_relaxed_extjson(),
    }
}
