//! Document sources the scanner reads from.
//!
//! A [`DocumentSource`] answers approximate counts and hands out
//! independent [`SourceConnection`]s, one per scan worker. Connections run
//! `skip`/`limit` range scans that yield documents lazily in the source's
//! natural order.

use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    sync::Arc,
};

use thiserror::Error;

use crate::document::{Document, document_from_json};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to connect to document source: {0}")]
    Connect(String),
    #[error("query against collection '{collection}' failed: {message}")]
    Query { collection: String, message: String },
    #[error("could not decode document: {0}")]
    Decode(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type DocumentStream<'a> = Box<dyn Iterator<Item = Result<Document, SourceError>> + 'a>;

pub trait SourceConnection {
    fn scan(
        &mut self,
        collection: &str,
        skip: u64,
        limit: u64,
    ) -> Result<DocumentStream<'_>, SourceError>;
}

pub trait DocumentSource: Send + Sync {
    /// Approximate document count; may lag concurrent writes.
    fn estimated_count(&self, collection: &str) -> Result<u64, SourceError>;

    /// Opens a connection owned by the caller for the duration of one scan.
    fn connect(&self) -> Result<Box<dyn SourceConnection>, SourceError>;
}

/// Collections stored as `<collection>.jsonl` files, one document per line.
#[derive(Debug, Clone)]
pub struct JsonLinesSource {
    dir: PathBuf,
}

impl JsonLinesSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.jsonl"))
    }
}

impl DocumentSource for JsonLinesSource {
    fn estimated_count(&self, collection: &str) -> Result<u64, SourceError> {
        let path = self.collection_path(collection);
        if !path.is_file() {
            return Ok(0);
        }
        let mut count = 0u64;
        for line in BufReader::new(File::open(&path)?).lines() {
            if !line?.trim().is_empty() {
                count += 1;
            }
        }
        Ok(count)
    }

    fn connect(&self) -> Result<Box<dyn SourceConnection>, SourceError> {
        if !self.dir.is_dir() {
            return Err(SourceError::Connect(format!(
                "source directory {:?} does not exist",
                self.dir
            )));
        }
        Ok(Box::new(JsonLinesConnection {
            dir: self.dir.clone(),
        }))
    }
}

struct JsonLinesConnection {
    dir: PathBuf,
}

impl SourceConnection for JsonLinesConnection {
    fn scan(
        &mut self,
        collection: &str,
        skip: u64,
        limit: u64,
    ) -> Result<DocumentStream<'_>, SourceError> {
        let path = self.dir.join(format!("{collection}.jsonl"));
        if !path.is_file() {
            return Ok(Box::new(std::iter::empty()));
        }
        let lines = open_lines(&path)?;
        let documents = lines
            .filter(|line| line.as_ref().map_or(true, |text| !text.trim().is_empty()))
            .skip(to_usize(skip))
            .take(to_usize(limit))
            .map(|line| {
                let line = line?;
                let value = serde_json::from_str(&line)
                    .map_err(|err| SourceError::Decode(err.to_string()))?;
                document_from_json(value)
                    .ok_or_else(|| SourceError::Decode("line is not a JSON object".to_string()))
            });
        Ok(Box::new(documents))
    }
}

fn open_lines(path: &Path) -> Result<std::io::Lines<BufReader<File>>, SourceError> {
    Ok(BufReader::new(File::open(path)?).lines())
}

fn to_usize(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

/// In-process collections, shared read-only by every connection.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    collections: Arc<HashMap<String, Vec<Document>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(mut self, name: impl Into<String>, documents: Vec<Document>) -> Self {
        Arc::make_mut(&mut self.collections).insert(name.into(), documents);
        self
    }
}

impl DocumentSource for MemorySource {
    fn estimated_count(&self, collection: &str) -> Result<u64, SourceError> {
        Ok(self
            .collections
            .get(collection)
            .map_or(0, |documents| documents.len() as u64))
    }

    fn connect(&self) -> Result<Box<dyn SourceConnection>, SourceError> {
        Ok(Box::new(MemoryConnection {
            collections: Arc::clone(&self.collections),
        }))
    }
}

struct MemoryConnection {
    collections: Arc<HashMap<String, Vec<Document>>>,
}

impl SourceConnection for MemoryConnection {
    fn scan(
        &mut self,
        collection: &str,
        skip: u64,
        limit: u64,
    ) -> Result<DocumentStream<'_>, SourceError> {
        let documents = self
            .collections
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(Box::new(
            documents
                .iter()
                .skip(to_usize(skip))
                .take(to_usize(limit))
                .cloned()
                .map(Ok),
        ))
    }
}
