use thiserror::Error;

/// Fatal problems with an uploaded sheet.
///
/// Everything else (missing postal codes, unparsable dates, unknown
/// coordinates) is reported as a diagnostic and never stops processing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SheetError {
    #[error("missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("sheet has no header row")]
    NoHeader,

    #[error("workbook has several sheets, select one of: {}", .0.join(", "))]
    SheetNotSelected(Vec<String>),

    #[error("no sheet named {name:?} in workbook, available: {}", .available.join(", "))]
    UnknownSheet { name: String, available: Vec<String> },
}
