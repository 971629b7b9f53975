//! Sheet input: delimited text exports, or one sheet of a workbook.

use anyhow::Result;
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::io::Read;
use tracing::debug;

use crate::error::SheetError;
use crate::workbook::{is_workbook, read_workbook_sheet};

/// An untyped sheet: a header row and cells as text.
///
/// Every row has exactly `headers.len()` cells; short rows are padded with
/// empty cells and long rows truncated. An empty cell means "missing".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawSheet {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Appends a row, fitting it to the header width.
    pub fn push_row(&mut self, mut cells: Vec<String>) {
        cells.resize(self.headers.len(), String::new());
        self.rows.push(cells);
    }
}

/// Parses a sheet from `reader`.
///
/// # Errors
///
/// Returns an error on malformed CSV, or [`SheetError::NoHeader`] if the
/// input is empty.
pub fn parse_sheet<R: Read>(reader: R, delimiter: u8) -> Result<RawSheet> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    if headers.iter().all(String::is_empty) {
        return Err(SheetError::NoHeader.into());
    }

    let mut sheet = RawSheet::new(headers);

    for result in rdr.records() {
        let record = result?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        sheet.push_row(record.iter().map(str::to_string).collect());
    }

    debug!(
        columns = sheet.headers.len(),
        rows = sheet.rows.len(),
        "Sheet parsed"
    );

    Ok(sheet)
}

/// Reads and parses the sheet stored at `path`.
#[tracing::instrument]
pub fn read_sheet(path: &str, delimiter: u8) -> Result<RawSheet> {
    let file = File::open(path)?;
    parse_sheet(file, delimiter)
}

/// Reads the input at `path`: a workbook sheet (selected by `sheet`) when the
/// extension names a workbook format, delimited text otherwise.
pub fn read_input(path: &str, sheet: Option<&str>, delimiter: u8) -> Result<RawSheet> {
    if is_workbook(path) {
        read_workbook_sheet(path, sheet)
    } else {
        read_sheet(path, delimiter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_semicolon_sheet() {
        let input = "Code postal destinataire;Status\n75001;Livré\n1000;Non livré\n";
        let sheet = parse_sheet(input.as_bytes(), b';').unwrap();

        assert_eq!(sheet.headers, vec!["Code postal destinataire", "Status"]);
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[1], vec!["1000", "Non livré"]);
    }

    #[test]
    fn test_postal_codes_stay_text() {
        let input = "cp\n01000\n";
        let sheet = parse_sheet(input.as_bytes(), b';').unwrap();
        assert_eq!(sheet.rows[0][0], "01000");
    }

    #[test]
    fn test_bom_is_stripped_and_cells_trimmed() {
        let input = "\u{feff}a;b\n  x ; y\n";
        let sheet = parse_sheet(input.as_bytes(), b';').unwrap();
        assert_eq!(sheet.headers[0], "a");
        assert_eq!(sheet.rows[0], vec!["x", "y"]);
    }

    #[test]
    fn test_ragged_rows_are_fitted() {
        let input = "a,b,c\n1\n1,2,3,4\n";
        let sheet = parse_sheet(input.as_bytes(), b',').unwrap();
        assert_eq!(sheet.rows[0], vec!["1", "", ""]);
        assert_eq!(sheet.rows[1], vec!["1", "2", "3"]);
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let input = "a;b\n;\nx;y\n";
        let sheet = parse_sheet(input.as_bytes(), b';').unwrap();
        assert_eq!(sheet.rows.len(), 1);
    }

    #[test]
    fn test_empty_input_has_no_header() {
        let result = parse_sheet("".as_bytes(), b';');
        assert!(result.is_err());
    }
}
