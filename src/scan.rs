//! Parallel full-collection scans.
//!
//! The collection's estimated count is split into contiguous `skip`/`limit`
//! partitions. A rayon pool bounded by `max_workers` scans the partitions in
//! parallel; each one opens its own source connection, maps every document
//! and streams the record straight to the sink. Every partition yields a
//! report, so the caller always learns which ranges finished and which did
//! not.
//!
//! A connection failure retries only the part of the range not yet seen.
//! Records that fail coercion are skipped and counted. Ordering across the
//! scan is whatever the source returns.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    thread,
    time::Duration,
};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::{
    coerce::text_value,
    config::{
        Config, DEFAULT_PARTITIONS, DEFAULT_PROGRESS_INTERVAL, DEFAULT_RETRY_ATTEMPTS,
        DEFAULT_RETRY_BACKOFF_MS,
    },
    document::{Document, ID_FIELD},
    mapper::RecordMapper,
    sink::RecordSink,
    source::{DocumentSource, SourceError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub index: usize,
    pub skip: u64,
    pub limit: u64,
}

/// Splits `[0, count)` into `partitions` ranges of `ceil(count / partitions)`.
///
/// The last range keeps the full chunk size and is cut short by the source;
/// ranges starting at or beyond `count` are dropped.
pub fn plan_partitions(count: u64, partitions: usize) -> Vec<Partition> {
    if count == 0 {
        return Vec::new();
    }
    let partitions = partitions.max(1);
    let chunk = count.div_ceil(partitions as u64);
    (0..partitions)
        .map(|index| Partition {
            index,
            skip: index as u64 * chunk,
            limit: chunk,
        })
        .take_while(|partition| partition.skip < count)
        .collect()
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub partitions: usize,
    pub max_workers: usize,
    pub retry_attempts: u32,
    pub retry_backoff: Duration,
    pub progress_interval: u64,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            partitions: DEFAULT_PARTITIONS,
            max_workers: DEFAULT_PARTITIONS,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl From<&Config> for ScanOptions {
    fn from(config: &Config) -> Self {
        Self {
            partitions: config.partitions(),
            max_workers: config.max_workers(),
            retry_attempts: config.retry_attempts(),
            retry_backoff: config.retry_backoff(),
            progress_interval: config.progress_interval(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartitionReport {
    pub partition: Partition,
    pub emitted: u64,
    pub skipped_records: u64,
    pub attempts: u32,
    pub error: Option<String>,
}

impl PartitionReport {
    fn new(partition: Partition) -> Self {
        Self {
            partition,
            emitted: 0,
            skipped_records: 0,
            attempts: 0,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    pub stream: String,
    pub collection: String,
    pub estimated_count: u64,
    pub partitions: Vec<PartitionReport>,
}

impl ScanReport {
    pub fn is_complete(&self) -> bool {
        self.partitions.iter().all(PartitionReport::is_success)
    }

    pub fn total_emitted(&self) -> u64 {
        self.partitions.iter().map(|p| p.emitted).sum()
    }

    pub fn total_skipped(&self) -> u64 {
        self.partitions.iter().map(|p| p.skipped_records).sum()
    }

    pub fn failed(&self) -> impl Iterator<Item = &PartitionReport> {
        self.partitions.iter().filter(|p| !p.is_success())
    }
}

enum ScanFailure {
    Source(SourceError),
    Sink(anyhow::Error),
}

/// Bookkeeping shared by one partition's attempts.
struct PartitionProgress {
    seen: u64,
    report: PartitionReport,
}

pub struct CollectionScanner<'a> {
    source: &'a dyn DocumentSource,
    sink: &'a dyn RecordSink,
    options: &'a ScanOptions,
}

impl<'a> CollectionScanner<'a> {
    pub fn new(
        source: &'a dyn DocumentSource,
        sink: &'a dyn RecordSink,
        options: &'a ScanOptions,
    ) -> Self {
        Self {
            source,
            sink,
            options,
        }
    }

    pub fn scan(
        &self,
        stream: &str,
        collection: &str,
        mapper: &dyn RecordMapper,
    ) -> Result<ScanReport> {
        let estimated_count = self
            .source
            .estimated_count(collection)
            .with_context(|| format!("Counting documents in collection '{collection}'"))?;
        let mut report = ScanReport {
            stream: stream.to_string(),
            collection: collection.to_string(),
            estimated_count,
            partitions: Vec::new(),
        };
        if estimated_count == 0 {
            info!("Collection '{collection}' is empty; nothing to extract for '{stream}'");
            return Ok(report);
        }

        let plan = plan_partitions(estimated_count, self.options.partitions);
        let workers = self.options.max_workers.clamp(1, plan.len());
        info!(
            "Scanning ~{estimated_count} document(s) from '{collection}' in {} partition(s) with {workers} worker(s)",
            plan.len()
        );

        let emitted_total = AtomicU64::new(0);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .context("Building scan worker pool")?;
        report.partitions = pool.install(|| {
            plan.par_iter()
                .map(|partition| {
                    self.scan_partition(stream, collection, mapper, *partition, &emitted_total)
                })
                .collect()
        });

        for failed in report.failed() {
            warn!(
                "Partition {} of '{stream}' (skip {}, limit {}) failed after {} attempt(s): {}",
                failed.partition.index,
                failed.partition.skip,
                failed.partition.limit,
                failed.attempts,
                failed.error.as_deref().unwrap_or_default()
            );
        }
        Ok(report)
    }

    fn scan_partition(
        &self,
        stream: &str,
        collection: &str,
        mapper: &dyn RecordMapper,
        partition: Partition,
        emitted_total: &AtomicU64,
    ) -> PartitionReport {
        debug!(
            "Partition {} of '{stream}': skip {}, limit {}",
            partition.index, partition.skip, partition.limit
        );
        let mut progress = PartitionProgress {
            seen: 0,
            report: PartitionReport::new(partition),
        };
        loop {
            progress.report.attempts += 1;
            let skip = partition.skip + progress.seen;
            let limit = partition.limit - progress.seen;
            let outcome = self.scan_range(
                stream,
                collection,
                mapper,
                skip,
                limit,
                &mut progress,
                emitted_total,
            );
            match outcome {
                Ok(()) => break,
                Err(ScanFailure::Sink(err)) => {
                    progress.report.error = Some(format!("record sink failed: {err:#}"));
                    break;
                }
                Err(ScanFailure::Source(err)) => {
                    if progress.seen >= partition.limit {
                        break;
                    }
                    if progress.report.attempts > self.options.retry_attempts {
                        progress.report.error = Some(err.to_string());
                        break;
                    }
                    warn!(
                        "Partition {} of '{stream}' lost its source after {} document(s): {err}; retrying remaining range",
                        partition.index, progress.seen
                    );
                    thread::sleep(self.options.retry_backoff * progress.report.attempts);
                }
            }
        }
        debug!(
            "Partition {} of '{stream}' finished: {} emitted, {} skipped",
            partition.index, progress.report.emitted, progress.report.skipped_records
        );
        progress.report
    }

    #[allow(clippy::too_many_arguments)]
    fn scan_range(
        &self,
        stream: &str,
        collection: &str,
        mapper: &dyn RecordMapper,
        skip: u64,
        limit: u64,
        progress: &mut PartitionProgress,
        emitted_total: &AtomicU64,
    ) -> Result<(), ScanFailure> {
        let mut connection = self.source.connect().map_err(ScanFailure::Source)?;
        let documents = connection
            .scan(collection, skip, limit)
            .map_err(ScanFailure::Source)?;
        for item in documents {
            let document = item.map_err(ScanFailure::Source)?;
            progress.seen += 1;
            match mapper.map(&document) {
                Ok(record) => {
                    self.sink
                        .write_record(stream, &record)
                        .map_err(ScanFailure::Sink)?;
                    progress.report.emitted += 1;
                    self.note_progress(stream, emitted_total);
                }
                Err(err) => {
                    progress.report.skipped_records += 1;
                    warn!(
                        "Skipping '{stream}' document {}: {err}",
                        document_label(&document)
                    );
                }
            }
        }
        Ok(())
    }

    fn note_progress(&self, stream: &str, emitted_total: &AtomicU64) {
        let total = emitted_total.fetch_add(1, Ordering::Relaxed) + 1;
        let interval = self.options.progress_interval;
        if interval > 0 && total % interval == 0 {
            info!("'{stream}': {total} record(s) emitted");
        }
    }
}

fn document_label(document: &Document) -> String {
    document
        .get(ID_FIELD)
        .map(text_value)
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| "<no _id>".to_string())
}
