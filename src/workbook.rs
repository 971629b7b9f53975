//! Spreadsheet workbook reader (xlsx, xlsm, xlsb, xls, ods).

use anyhow::Result;
use calamine::{Data, Reader, open_workbook_auto};
use std::path::Path;
use tracing::debug;

use crate::error::SheetError;
use crate::parser::RawSheet;

const WORKBOOK_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

pub fn is_workbook(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            WORKBOOK_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Names of the sheets in the workbook at `path`, in workbook order.
pub fn sheet_names(path: &str) -> Result<Vec<String>> {
    Ok(open_workbook_auto(path)?.sheet_names())
}

/// Reads one sheet of the workbook at `path`.
///
/// Without `sheet`, a workbook with a single sheet uses it; otherwise the
/// available names are returned in [`SheetError::SheetNotSelected`].
#[tracing::instrument]
pub fn read_workbook_sheet(path: &str, sheet: Option<&str>) -> Result<RawSheet> {
    let mut workbook = open_workbook_auto(path)?;
    let name = select_sheet(&workbook.sheet_names(), sheet)?;
    let range = workbook.worksheet_range(&name)?;
    let sheet = sheet_from_rows(range.rows())?;

    debug!(
        sheet = %name,
        columns = sheet.headers.len(),
        rows = sheet.rows.len(),
        "Workbook sheet read"
    );

    Ok(sheet)
}

fn select_sheet(available: &[String], requested: Option<&str>) -> Result<String, SheetError> {
    match (requested, available) {
        (Some(name), _) if available.iter().any(|s| s == name) => Ok(name.to_string()),
        (Some(name), _) => Err(SheetError::UnknownSheet {
            name: name.to_string(),
            available: available.to_vec(),
        }),
        (None, [only]) => Ok(only.clone()),
        (None, _) => Err(SheetError::SheetNotSelected(available.to_vec())),
    }
}

/// First row is the header; fully empty rows are skipped.
fn sheet_from_rows<'a, I>(mut rows: I) -> Result<RawSheet, SheetError>
where
    I: Iterator<Item = &'a [Data]>,
{
    let headers: Vec<String> = rows
        .next()
        .map(|row| row.iter().map(cell_text).collect())
        .unwrap_or_default();

    if headers.iter().all(String::is_empty) {
        return Err(SheetError::NoHeader);
    }

    let mut sheet = RawSheet::new(headers);
    for row in rows {
        let cells: Vec<String> = row.iter().map(cell_text).collect();
        if cells.iter().all(String::is_empty) {
            continue;
        }
        sheet.push_row(cells);
    }

    Ok(sheet)
}

/// Cell as text. Whole numbers lose their decimal part so a numeric postal
/// code reads "1000", never "1000.0".
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 => format!("{f:.0}"),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(datetime) => datetime.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => dt.as_f64().to_string(),
        },
        other => other.to_string(),
    }
}
