use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::{
    config::Config,
    mapper::{RecordMapper, SchemaRecordMapper},
    proposal::ProposalRecordTransformer,
    scan::{CollectionScanner, ScanOptions, ScanReport},
    schema::Schema,
    sink::RecordSink,
    source::DocumentSource,
    stream::Stream,
};

/// Extraction entry point for one stream.
///
/// Binds the stream to its collection, owns the schema and scan options,
/// and picks the mapper: proposals get the proposal transformer, every other
/// stream maps straight from the schema.
pub struct ReportingService {
    stream: Stream,
    schema: Arc<Schema>,
    platform: String,
    options: ScanOptions,
}

impl ReportingService {
    pub fn new(stream: Stream, schema: Schema, config: &Config) -> Self {
        Self {
            stream,
            schema: Arc::new(schema),
            platform: config.platform.clone(),
            options: ScanOptions::from(config),
        }
    }

    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    pub fn stream(&self) -> Stream {
        self.stream
    }

    pub fn collection(&self) -> &'static str {
        self.stream.collection()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn mapper(&self) -> Box<dyn RecordMapper> {
        let base = SchemaRecordMapper::new(Arc::clone(&self.schema), self.platform.clone());
        match self.stream {
            Stream::Proposal => Box::new(ProposalRecordTransformer::new(base)),
            _ => Box::new(base),
        }
    }

    pub fn get_reports(
        &self,
        source: &dyn DocumentSource,
        sink: &dyn RecordSink,
    ) -> Result<ScanReport> {
        info!(
            "Extracting stream '{}' from collection '{}'",
            self.stream,
            self.collection()
        );
        let mapper = self.mapper();
        sink.begin_stream(self.stream.as_str(), &mapper.columns())
            .with_context(|| format!("Starting output for stream '{}'", self.stream))?;
        let scanner = CollectionScanner::new(source, sink, &self.options);
        let report = scanner
            .scan(self.stream.as_str(), self.collection(), mapper.as_ref())
            .with_context(|| format!("Extracting stream '{}'", self.stream))?;
        sink.flush()
            .with_context(|| format!("Flushing records for stream '{}'", self.stream))?;

        if report.total_skipped() > 0 {
            warn!(
                "Skipped {} '{}' document(s) that could not be coerced",
                report.total_skipped(),
                self.stream
            );
        }
        info!(
            "Stream '{}': {} record(s) emitted from ~{} document(s)",
            self.stream,
            report.total_emitted(),
            report.estimated_count
        );
        Ok(report)
    }
}
