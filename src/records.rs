//! Record cleaning: raw sheet rows to validated [`DeliveryRecord`]s.
//!
//! Cleaning is a pure transform. It never logs and never mutates its input;
//! non-fatal problems are counted in a [`CleanReport`] and left to the caller
//! to surface. Derived values (delays, month) are computed on demand from the
//! parsed dates, so cleaning its own output gives back the same records.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;

use crate::config::{ColumnNames, DashboardConfig};
use crate::dates::{days_between, format_date, month_name, parse_date};
use crate::error::SheetError;
use crate::parser::RawSheet;

/// Columns written by a previous cleaning pass. Ignored on input and
/// recomputed, never accumulated.
pub const DERIVED_COLUMNS: [&str; 7] = [
    "Date livraison",
    "Remis le",
    "Mois livraison",
    "delta_jour",
    "delta_jour_residence",
    "Retard",
    "Retard residence",
];

/// Delay policy: a delay is only established when both dates are known and
/// more than one day apart. A missing date counts as "not late".
pub fn exceeds_one_day(days: Option<i64>) -> bool {
    matches!(days, Some(d) if d > 1)
}

pub fn is_valid_postal_code(code: &str) -> bool {
    code.len() == 5 && code.bytes().all(|b| b.is_ascii_digit())
}

/// Left-pads with zeros to 5 characters. Longer codes are returned unchanged.
pub fn pad_postal_code(code: &str) -> String {
    format!("{code:0>5}")
}

/// Source text of date cells that did not parse. Written back in the
/// cleaned sheet so rows that only differ there stay distinct.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct UnparsedDates {
    pub pickup: Option<String>,
    pub delivery: Option<String>,
    pub customer_arrival: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeliveryRecord {
    pub postal_code: String,
    pub city: Option<String>,
    pub carrier: Option<String>,
    pub residence: Option<String>,
    pub status: String,
    /// Lower-cased packaging error / shortage flag.
    pub packaging_flag: String,
    pub packaging_error: bool,
    pub pickup_date: Option<NaiveDate>,
    pub delivery_date: Option<NaiveDate>,
    pub customer_arrival_date: Option<NaiveDate>,
    pub unparsed_dates: UnparsedDates,
    /// Unrecognized source cells, aligned with [`Cleaned::extra_columns`].
    pub extra: Vec<String>,
}

impl DeliveryRecord {
    pub fn delivery_delay_days(&self) -> Option<i64> {
        days_between(self.pickup_date, self.delivery_date)
    }

    pub fn delayed(&self) -> bool {
        exceeds_one_day(self.delivery_delay_days())
    }

    pub fn residence_delay_days(&self) -> Option<i64> {
        days_between(self.delivery_date, self.customer_arrival_date)
    }

    pub fn residence_delayed(&self) -> bool {
        exceeds_one_day(self.residence_delay_days())
    }

    pub fn delivery_month(&self) -> Option<&'static str> {
        self.delivery_date.map(month_name)
    }

    /// Residence, or `individual` when the record has none.
    pub fn residence_category<'a>(&'a self, individual: &'a str) -> &'a str {
        self.residence.as_deref().unwrap_or(individual)
    }

    /// Cells for [`DERIVED_COLUMNS`], in the same order.
    pub fn derived_cells(&self) -> [String; 7] {
        let date = |d: Option<NaiveDate>| d.map(format_date).unwrap_or_default();
        let days = |d: Option<i64>| d.map(|d| d.to_string()).unwrap_or_default();
        let flag = |b: bool| String::from(if b { "oui" } else { "non" });

        [
            date(self.delivery_date),
            date(self.pickup_date),
            self.delivery_month().unwrap_or_default().to_string(),
            days(self.delivery_delay_days()),
            days(self.residence_delay_days()),
            flag(self.delayed()),
            flag(self.residence_delayed()),
        ]
    }
}

/// Non-fatal diagnostics from one cleaning pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanReport {
    pub input_rows: usize,
    pub duplicates_removed: usize,
    pub dropped_missing_postal_code: usize,
    pub dropped_invalid_postal_code: usize,
    pub unparsable_pickup_dates: usize,
    pub unparsable_delivery_dates: usize,
    pub unparsable_customer_arrival_dates: usize,
}

impl CleanReport {
    pub fn dropped_rows(&self) -> usize {
        self.dropped_missing_postal_code + self.dropped_invalid_postal_code
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cleaned {
    pub records: Vec<DeliveryRecord>,
    pub extra_columns: Vec<String>,
    pub report: CleanReport,
}

impl Cleaned {
    /// Rebuilds a sheet holding the normalized source columns (derived
    /// columns excluded).
    pub fn to_sheet(&self, columns: &ColumnNames) -> RawSheet {
        let mut headers: Vec<String> = [
            &columns.postal_code,
            &columns.city,
            &columns.carrier,
            &columns.residence,
            &columns.status,
            &columns.packaging_flag,
            &columns.pickup_date,
            &columns.delivery_date,
            &columns.customer_arrival_date,
        ]
        .into_iter()
        .cloned()
        .collect();
        headers.extend(self.extra_columns.iter().cloned());

        let mut sheet = RawSheet::new(headers);
        let date = |d: Option<NaiveDate>, raw: &Option<String>| match d {
            Some(d) => format_date(d),
            None => raw.clone().unwrap_or_default(),
        };

        for r in &self.records {
            let mut cells = vec![
                r.postal_code.clone(),
                r.city.clone().unwrap_or_default(),
                r.carrier.clone().unwrap_or_default(),
                r.residence.clone().unwrap_or_default(),
                r.status.clone(),
                r.packaging_flag.clone(),
                date(r.pickup_date, &r.unparsed_dates.pickup),
                date(r.delivery_date, &r.unparsed_dates.delivery),
                date(r.customer_arrival_date, &r.unparsed_dates.customer_arrival),
            ];
            cells.extend(r.extra.iter().cloned());
            sheet.push_row(cells);
        }

        sheet
    }
}

/// Column positions resolved once per sheet.
struct Columns {
    postal_code: usize,
    packaging_flag: usize,
    pickup_date: usize,
    delivery_date: usize,
    customer_arrival_date: usize,
    status: usize,
    city: Option<usize>,
    carrier: Option<usize>,
    residence: Option<usize>,
    extra: Vec<usize>,
    /// Every column except derived ones; the duplicate key.
    source: Vec<usize>,
}

impl Columns {
    fn resolve(sheet: &RawSheet, names: &ColumnNames) -> Result<Self, SheetError> {
        let missing: Vec<String> = names
            .required()
            .into_iter()
            .filter(|name| sheet.column_index(name).is_none())
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(SheetError::MissingColumns(missing));
        }

        // presence checked above
        let required = |name: &str| sheet.column_index(name).unwrap_or_default();

        let mut columns = Columns {
            postal_code: required(&names.postal_code),
            packaging_flag: required(&names.packaging_flag),
            pickup_date: required(&names.pickup_date),
            delivery_date: required(&names.delivery_date),
            customer_arrival_date: required(&names.customer_arrival_date),
            status: required(&names.status),
            city: sheet.column_index(&names.city),
            carrier: sheet.column_index(&names.carrier),
            residence: sheet.column_index(&names.residence),
            extra: Vec::new(),
            source: Vec::new(),
        };

        let known = [
            Some(columns.postal_code),
            Some(columns.packaging_flag),
            Some(columns.pickup_date),
            Some(columns.delivery_date),
            Some(columns.customer_arrival_date),
            Some(columns.status),
            columns.city,
            columns.carrier,
            columns.residence,
        ];

        columns.source = (0..sheet.headers.len())
            .filter(|i| !DERIVED_COLUMNS.contains(&sheet.headers[*i].as_str()))
            .collect();
        columns.extra = columns
            .source
            .iter()
            .copied()
            .filter(|i| !known.contains(&Some(*i)))
            .collect();

        Ok(columns)
    }
}

fn cell(row: &[String], index: usize) -> &str {
    row.get(index).map(|c| c.trim()).unwrap_or_default()
}

fn optional_cell(row: &[String], index: Option<usize>) -> Option<String> {
    let value = cell(row, index?);
    (!value.is_empty()).then(|| value.to_string())
}

/// Parses one date cell. Text that does not parse is returned alongside the
/// missing date.
fn parse_date_cell(raw: &str, formats: &[String]) -> (Option<NaiveDate>, Option<String>) {
    match parse_date(raw, formats) {
        Some(date) => (Some(date), None),
        None if raw.is_empty() => (None, None),
        None => (None, Some(raw.to_string())),
    }
}

/// Cleans one sheet.
///
/// Rows identical to an earlier row in every source cell (trimmed) are
/// removed first. Rows without a postal code, or whose code cannot be a
/// 5-digit code, are then dropped and counted. The rest are normalized:
/// postal code padded, flag lower-cased, dates parsed.
///
/// # Errors
///
/// Returns [`SheetError::MissingColumns`] if a required column is absent.
pub fn clean(sheet: &RawSheet, config: &DashboardConfig) -> Result<Cleaned, SheetError> {
    let cols = Columns::resolve(sheet, &config.columns)?;
    let affirmative = config.affirmative.to_lowercase();
    let formats = &config.date_formats;

    let mut report = CleanReport {
        input_rows: sheet.rows.len(),
        ..Default::default()
    };
    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for row in &sheet.rows {
        let key: Vec<&str> = cols.source.iter().map(|i| cell(row, *i)).collect();
        if !seen.insert(key) {
            report.duplicates_removed += 1;
            continue;
        }

        let postal_code = cell(row, cols.postal_code);
        if postal_code.is_empty() {
            report.dropped_missing_postal_code += 1;
            continue;
        }
        let postal_code = pad_postal_code(postal_code);
        if !is_valid_postal_code(&postal_code) {
            report.dropped_invalid_postal_code += 1;
            continue;
        }

        let packaging_flag = cell(row, cols.packaging_flag).to_lowercase();
        let (pickup_date, pickup) = parse_date_cell(cell(row, cols.pickup_date), formats);
        let (delivery_date, delivery) = parse_date_cell(cell(row, cols.delivery_date), formats);
        let (customer_arrival_date, customer_arrival) =
            parse_date_cell(cell(row, cols.customer_arrival_date), formats);

        if pickup.is_some() {
            report.unparsable_pickup_dates += 1;
        }
        if delivery.is_some() {
            report.unparsable_delivery_dates += 1;
        }
        if customer_arrival.is_some() {
            report.unparsable_customer_arrival_dates += 1;
        }

        records.push(DeliveryRecord {
            postal_code,
            city: optional_cell(row, cols.city),
            carrier: optional_cell(row, cols.carrier),
            residence: optional_cell(row, cols.residence),
            status: cell(row, cols.status).to_string(),
            packaging_error: packaging_flag == affirmative,
            packaging_flag,
            pickup_date,
            delivery_date,
            customer_arrival_date,
            unparsed_dates: UnparsedDates {
                pickup,
                delivery,
                customer_arrival,
            },
            extra: cols
                .extra
                .iter()
                .map(|i| cell(row, *i).to_string())
                .collect(),
        });
    }

    Ok(Cleaned {
        records,
        extra_columns: cols
            .extra
            .iter()
            .map(|i| sheet.headers[*i].clone())
            .collect(),
        report,
    })
}
