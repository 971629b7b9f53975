//! Output formatting and persistence for cleaned records and reports.
//!
//! Supports pretty-printing, JSON files, and CSV tables.

use anyhow::Result;
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

use crate::config::ColumnNames;
use crate::records::{Cleaned, DERIVED_COLUMNS};

/// Logs a value using Rust's debug pretty-print format.
pub fn print_pretty<T: std::fmt::Debug>(value: &T) {
    debug!("{:#?}", value);
}

/// Logs a value as pretty-printed JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn create(path: &str) -> Result<File> {
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(File::create(path)?)
}

/// Writes a value as pretty-printed JSON, replacing any existing file.
pub fn write_json<T: Serialize>(path: &str, value: &T) -> Result<()> {
    let mut file = create(path)?;
    serde_json::to_writer_pretty(&mut file, value)?;
    file.write_all(b"\n")?;
    debug!(path, "JSON written");
    Ok(())
}

/// Writes cleaned records: normalized source columns, then derived columns.
pub fn write_cleaned_csv<W: Write>(
    writer: W,
    cleaned: &Cleaned,
    columns: &ColumnNames,
    delimiter: u8,
) -> Result<()> {
    let sheet = cleaned.to_sheet(columns);
    let mut writer = WriterBuilder::new().delimiter(delimiter).from_writer(writer);

    writer.write_record(sheet.headers.iter().map(String::as_str).chain(DERIVED_COLUMNS))?;

    for (cells, record) in sheet.rows.iter().zip(&cleaned.records) {
        let derived = record.derived_cells();
        writer.write_record(cells.iter().chain(derived.iter()))?;
    }

    writer.flush()?;
    Ok(())
}

pub fn write_cleaned_file(
    path: &str,
    cleaned: &Cleaned,
    columns: &ColumnNames,
    delimiter: u8,
) -> Result<()> {
    write_cleaned_csv(create(path)?, cleaned, columns, delimiter)?;
    debug!(path, rows = cleaned.records.len(), "Cleaned CSV written");
    Ok(())
}

/// Writes serializable rows (e.g. a city map) as a CSV table with headers.
pub fn write_rows<T: Serialize>(path: &str, rows: &[T], delimiter: u8) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(create(path)?);

    for row in rows {
        writer.serialize(row)?;
    }

    writer.flush()?;
    debug!(path, rows = rows.len(), "CSV table written");
    Ok(())
}
