//! Record sinks: where mapped records go.
//!
//! Scan workers call [`RecordSink::write_record`] concurrently, so every sink
//! serializes writes behind its own lock. Before a stream's scan starts the
//! service announces its full column set through [`RecordSink::begin_stream`],
//! so tabular sinks never depend on which record arrives first.

use std::{
    collections::HashMap,
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use anyhow::{Context, Result, anyhow};
use log::debug;
use serde::Serialize;
use serde_json::Value;

use crate::{
    document::ID_FIELD,
    io_utils,
    record::{Record, RecordValue},
    schema::Schema,
};

pub trait RecordSink: Send + Sync {
    /// Declares every column records of `stream` may carry, in output order.
    fn begin_stream(&self, _stream: &str, _columns: &[String]) -> Result<()> {
        Ok(())
    }

    fn write_record(&self, stream: &str, record: &Record) -> Result<()>;

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|_| anyhow!("record sink lock poisoned"))
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
enum SingerMessage<'a> {
    Schema {
        stream: &'a str,
        schema: &'a Value,
        key_properties: &'a [&'a str],
    },
    Record {
        stream: &'a str,
        record: &'a Record,
    },
}

/// Singer-protocol JSON lines: `SCHEMA` and `RECORD` messages.
pub struct SingerSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl SingerSink<Box<dyn Write + Send>> {
    /// Writes to a file, or to stdout for `None` / `-`.
    pub fn to_path(path: Option<&Path>) -> Result<Self> {
        Ok(Self::new(io_utils::open_output(path)?))
    }
}

impl<W: Write + Send> SingerSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn write_schema(&self, stream: &str, schema: &Schema) -> Result<()> {
        self.write_message(&SingerMessage::Schema {
            stream,
            schema: schema.document(),
            key_properties: &[ID_FIELD],
        })
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|_| anyhow!("record sink lock poisoned"))
    }

    fn write_message(&self, message: &SingerMessage<'_>) -> Result<()> {
        let mut writer = lock(&self.writer)?;
        serde_json::to_writer(&mut *writer, message).context("Serializing Singer message")?;
        writer.write_all(b"\n").context("Writing Singer message")?;
        Ok(())
    }
}

impl<W: Write + Send> RecordSink for SingerSink<W> {
    fn write_record(&self, stream: &str, record: &Record) -> Result<()> {
        self.write_message(&SingerMessage::Record { stream, record })
    }

    fn flush(&self) -> Result<()> {
        lock(&self.writer)?.flush().context("Flushing Singer output")
    }
}

struct StreamTable {
    writer: csv::Writer<BufWriter<File>>,
    headers: Vec<String>,
}

/// One CSV file per stream, `<dir>/<stream>.csv`.
///
/// The header row is the column set passed to `begin_stream`; records are
/// written in that order with absent columns left empty. A stream written
/// without `begin_stream` takes its header from its first record.
pub struct CsvSink {
    dir: PathBuf,
    delimiter: u8,
    tables: Mutex<HashMap<String, StreamTable>>,
}

impl CsvSink {
    pub fn new(dir: &Path) -> Result<Self> {
        io_utils::ensure_output_dir(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            delimiter: io_utils::DEFAULT_CSV_DELIMITER,
            tables: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn stream_path(&self, stream: &str) -> PathBuf {
        self.dir.join(format!("{stream}.csv"))
    }

    fn open_table(&self, stream: &str, headers: Vec<String>) -> Result<StreamTable> {
        let path = self.stream_path(stream);
        let mut writer = io_utils::open_csv_writer(&path, self.delimiter)?;
        writer
            .write_record(&headers)
            .with_context(|| format!("Writing headers to {path:?}"))?;
        Ok(StreamTable { writer, headers })
    }
}

impl RecordSink for CsvSink {
    fn begin_stream(&self, stream: &str, columns: &[String]) -> Result<()> {
        let mut tables = lock(&self.tables)?;
        if tables.contains_key(stream) {
            return Err(anyhow!("CSV output for stream '{stream}' was already started"));
        }
        let table = self.open_table(stream, columns.to_vec())?;
        debug!("CSV output for '{stream}' declares {} column(s)", columns.len());
        tables.insert(stream.to_string(), table);
        Ok(())
    }

    fn write_record(&self, stream: &str, record: &Record) -> Result<()> {
        let mut tables = lock(&self.tables)?;
        if !tables.contains_key(stream) {
            let headers = record.keys().map(str::to_string).collect::<Vec<_>>();
            let table = self.open_table(stream, headers)?;
            tables.insert(stream.to_string(), table);
        }
        let Some(table) = tables.get_mut(stream) else {
            return Err(anyhow!("CSV table for stream '{stream}' is missing"));
        };
        if let Some(extra) = record.keys().find(|name| !table.headers.iter().any(|h| h == name)) {
            return Err(anyhow!(
                "Record for stream '{stream}' carries column '{extra}' missing from the CSV header"
            ));
        }
        let row = table
            .headers
            .iter()
            .map(|name| record.get(name).map(RecordValue::as_display).unwrap_or_default())
            .collect::<Vec<_>>();
        table
            .writer
            .write_record(&row)
            .with_context(|| format!("Writing row for stream '{stream}'"))
    }

    fn flush(&self) -> Result<()> {
        let mut tables = lock(&self.tables)?;
        for (stream, table) in tables.iter_mut() {
            table
                .writer
                .flush()
                .with_context(|| format!("Flushing CSV output for stream '{stream}'"))?;
        }
        Ok(())
    }
}

/// Collects records in memory.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<(String, Record)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Result<Vec<(String, Record)>> {
        Ok(lock(&self.records)?.clone())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(lock(&self.records)?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl RecordSink for MemorySink {
    fn write_record(&self, stream: &str, record: &Record) -> Result<()> {
        lock(&self.records)?.push((stream.to_string(), record.clone()));
        Ok(())
    }
}
