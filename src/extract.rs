//! The `extract` command: run every selected stream through its service.

use anyhow::{Context, Result, anyhow, bail};
use log::{info, warn};

use crate::{
    cli::{ExtractArgs, OutputFormat},
    config::Config,
    mongo::MongoSource,
    scan::ScanReport,
    schema::SchemaCatalog,
    service::ReportingService,
    sink::{CsvSink, RecordSink, SingerSink},
    source::{DocumentSource, JsonLinesSource},
    stream::Stream,
};

pub fn execute(args: &ExtractArgs) -> Result<()> {
    let mut config = Config::load(&args.config)?;
    if args.partitions.is_some() {
        config.partitions = args.partitions;
    }
    if args.max_workers.is_some() {
        config.max_workers = args.max_workers;
    }
    config.validate()?;

    let catalog = SchemaCatalog::load_dir(&args.schemas)
        .with_context(|| format!("Loading schemas from {:?}", args.schemas))?;
    let streams = if args.streams.is_empty() {
        catalog.streams().collect::<Vec<_>>()
    } else {
        args.streams.clone()
    };
    if streams.is_empty() {
        bail!("No stream schemas found in {:?}", args.schemas);
    }

    let source: Box<dyn DocumentSource> = match &args.source_dir {
        Some(dir) => {
            info!("Reading collections from JSON lines in {:?}", dir);
            Box::new(JsonLinesSource::new(dir))
        }
        None => Box::new(MongoSource::new(
            config.connection_string()?,
            config.database(),
        )),
    };

    let reports = match args.format {
        OutputFormat::Singer => {
            let sink = SingerSink::to_path(args.output.as_deref())?;
            run_streams(&streams, &catalog, &config, source.as_ref(), &sink, |stream| {
                let schema = schema_for(&catalog, stream)?;
                sink.write_schema(stream.as_str(), schema)
            })?
        }
        OutputFormat::Csv => {
            let dir = args
                .output
                .as_deref()
                .ok_or_else(|| anyhow!("--format csv requires --output <directory>"))?;
            let sink = CsvSink::new(dir)?;
            run_streams(&streams, &catalog, &config, source.as_ref(), &sink, |_| Ok(()))?
        }
    };

    let incomplete = reports
        .iter()
        .filter(|report| !report.is_complete())
        .collect::<Vec<_>>();
    if !incomplete.is_empty() {
        let names = incomplete
            .iter()
            .map(|report| report.stream.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        bail!("Extraction incomplete: partition failures in stream(s) {names}");
    }
    let total = reports.iter().map(ScanReport::total_emitted).sum::<u64>();
    info!("Emitted {total} record(s) across {} stream(s)", reports.len());
    Ok(())
}

fn schema_for(catalog: &SchemaCatalog, stream: Stream) -> Result<&crate::schema::Schema> {
    catalog
        .get(stream)
        .ok_or_else(|| anyhow!("No schema file found for stream '{stream}'"))
}

fn run_streams<F>(
    streams: &[Stream],
    catalog: &SchemaCatalog,
    config: &Config,
    source: &dyn DocumentSource,
    sink: &dyn RecordSink,
    mut before_stream: F,
) -> Result<Vec<ScanReport>>
where
    F: FnMut(Stream) -> Result<()>,
{
    let mut reports = Vec::with_capacity(streams.len());
    for &stream in streams {
        let schema = schema_for(catalog, stream)?;
        before_stream(stream)?;
        let service = ReportingService::new(stream, schema.clone(), config);
        let report = service.get_reports(source, sink)?;
        for failed in report.failed() {
            warn!(
                "'{}' partition {} emitted {} record(s) before failing",
                stream, failed.partition.index, failed.emitted
            );
        }
        reports.push(report);
    }
    Ok(reports)
}
