//! Output plumbing for record sinks.
//!
//! - **stdout**: the `-` path convention (or no path at all) routes output
//!   through standard output, which is reserved for emitted records; logs go
//!   to stderr.
//! - **CSV writers**: one buffered file per stream, quoting every field so
//!   sanitized text round-trips through downstream loaders.

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;

pub const DEFAULT_CSV_DELIMITER: u8 = b',';

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn open_output(path: Option<&Path>) -> Result<Box<dyn Write + Send>> {
    match path {
        Some(p) if !is_dash(p) => {
            let file = File::create(p).with_context(|| format!("Creating output file {p:?}"))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        _ => Ok(Box::new(std::io::stdout())),
    }
}

pub fn ensure_output_dir(dir: &Path) -> Result<()> {
    if is_dash(dir) {
        return Err(anyhow!("CSV output requires a directory, not stdout"));
    }
    fs::create_dir_all(dir).with_context(|| format!("Creating output directory {dir:?}"))
}

pub fn open_csv_writer(path: &Path, delimiter: u8) -> Result<csv::Writer<BufWriter<File>>> {
    let file = File::create(path).with_context(|| format!("Creating CSV file {path:?}"))?;
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Always)
        .has_headers(false);
    Ok(builder.from_writer(BufWriter::new(file)))
}
