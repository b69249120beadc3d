//! Persistence of arbitrage records.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use clap::ValueEnum;
use derive_more::Display;
use eyre::{Result, WrapErr};
use log::{info, warn};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::arb::arbitrage::ArbitrageRecord;

/// File format of the arbitrage output
#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// A single indented JSON array
    #[default]
    #[display("json")]
    Json,
    /// One JSON record per line
    #[display("jsonl")]
    #[value(name = "jsonl")]
    JsonLines,
}

impl OutputFormat {
    /// Picks the format from a file extension, `.jsonl` meaning JSON lines
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("jsonl") => Self::JsonLines,
            _ => Self::Json,
        }
    }
}

/// Writes the arbitrage records to `path`, replacing the file.
///
/// # Arguments
/// * `path` - Output file; its parent directories are created
/// * `records` - Records to write, in order
/// * `format` - File format
///
/// # Errors
/// * If the file cannot be created or written
pub fn dump_arbitrages(path: &Path, records: &[ArbitrageRecord], format: OutputFormat) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .wrap_err_with(|| format!("Couldn't create {}", parent.display()))?;
    }
    let file =
        File::create(path).wrap_err_with(|| format!("Couldn't dump arbitrages to {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    match format {
        OutputFormat::Json => {
            let mut serializer =
                serde_json::Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));
            records.serialize(&mut serializer)?;
            writeln!(writer)?;
        }
        OutputFormat::JsonLines => {
            for record in records {
                serde_json::to_writer(&mut writer, record)?;
                writeln!(writer)?;
            }
        }
    }
    writer.flush()?;

    info!(
        "Dumped {} arbitrages to {} ({format})",
        records.len(),
        path.display()
    );
    Ok(())
}

/// Reads arbitrage records written by [`dump_arbitrages`], in either format.
///
/// Malformed lines of a JSON lines file are skipped with a warning.
///
/// # Errors
/// * If the file cannot be read
/// * If a JSON array file is malformed
pub fn load_arbitrages(path: &Path) -> Result<Vec<ArbitrageRecord>> {
    let file =
        File::open(path).wrap_err_with(|| format!("Couldn't load arbitrages from {}", path.display()))?;
    let mut reader = BufReader::new(file);

    let is_array = loop {
        let buffer = reader.fill_buf()?;
        let Some(&first) = buffer.first() else {
            return Ok(Vec::new());
        };
        if first.is_ascii_whitespace() {
            reader.consume(1);
        } else {
            break first == b'[';
        }
    };

    if is_array {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        return serde_json::from_str(&text)
            .wrap_err_with(|| format!("Invalid arbitrages in {}", path.display()));
    }

    let mut records = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(record) => records.push(record),
            Err(e) => warn!(
                "Failed to parse line {} in {}: {e}",
                number + 1,
                path.display()
            ),
        }
    }
    Ok(records)
}
