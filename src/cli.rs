use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::stream::Stream;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Extract proposal-tool collections into flat records",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan source collections and emit one flat record per document
    Extract(ExtractArgs),
    /// List known streams, their collections, and loaded schema sizes
    Streams(StreamsArgs),
}

#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// JSON config file (platform and MongoDB connection settings)
    #[arg(short, long)]
    pub config: PathBuf,
    /// Directory containing `<stream>.json` schema files
    #[arg(short, long)]
    pub schemas: PathBuf,
    /// Streams to extract (defaults to every stream with a schema)
    #[arg(long = "stream", value_parser = parse_stream, action = clap::ArgAction::Append)]
    pub streams: Vec<Stream>,
    /// Read `<collection>.jsonl` files from this directory instead of MongoDB
    #[arg(long = "source-dir")]
    pub source_dir: Option<PathBuf>,
    /// Output format for emitted records
    #[arg(long, default_value = "singer")]
    pub format: OutputFormat,
    /// Output file for singer (stdout if omitted) or directory for csv
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Number of skip/limit partitions per collection
    #[arg(long)]
    pub partitions: Option<usize>,
    /// Upper bound on concurrent scan workers
    #[arg(long = "max-workers")]
    pub max_workers: Option<usize>,
}

#[derive(Debug, Args)]
pub struct StreamsArgs {
    /// Directory containing `<stream>.json` schema files
    #[arg(short, long)]
    pub schemas: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
#[value(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Singer SCHEMA/RECORD messages as JSON lines
    #[default]
    Singer,
    /// One CSV file per stream
    Csv,
}

fn parse_stream(value: &str) -> Result<Stream, String> {
    value.parse().map_err(|err: anyhow::Error| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_accepts_repeated_streams() {
        let cli = Cli::try_parse_from([
            "grader-extract",
            "extract",
            "-c",
            "config.json",
            "-s",
            "schemas",
            "--stream",
            "proposal",
            "--stream",
            "dashboard",
            "--format",
            "csv",
        ])
        .unwrap();
        match cli.command {
            Commands::Extract(args) => {
                assert_eq!(args.streams, vec![Stream::Proposal, Stream::Dashboard]);
                assert_eq!(args.format, OutputFormat::Csv);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn unknown_stream_is_rejected() {
        let result = Cli::try_parse_from([
            "grader-extract",
            "extract",
            "-c",
            "config.json",
            "-s",
            "schemas",
            "--stream",
            "nope",
        ]);
        assert!(result.is_err());
    }
}
