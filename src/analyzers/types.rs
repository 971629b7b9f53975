//! Data types produced by the aggregation pipeline.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::records::CleanReport;

/// Which records a city map counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    /// Every record, whatever its status.
    All,
    /// Status is exactly the configured delivered literal.
    Delivered,
    /// Any other status.
    NotDelivered,
}

/// Further narrowing of delivered records. Ignored for other statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ConditionFilter {
    Delayed,
    PackagingError,
}

/// Record count for one postal code, joined with its location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityCount {
    pub postal_code: String,
    pub city: Option<String>,
    pub count: usize,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub place_name: Option<String>,
}

/// One city map: counts per postal code for a status/condition selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityAggregate {
    /// Count column name from the configured status table.
    pub label: String,
    pub status: StatusFilter,
    pub condition: Option<ConditionFilter>,
    /// Ordered by postal code.
    pub rows: Vec<CityCount>,
}

impl CityAggregate {
    pub fn total(&self) -> usize {
        self.rows.iter().map(|r| r.count).sum()
    }

    pub fn count_for(&self, postal_code: &str) -> usize {
        self.rows
            .iter()
            .find(|r| r.postal_code == postal_code)
            .map_or(0, |r| r.count)
    }

    /// Rows that can be placed on a map.
    pub fn located(&self) -> impl Iterator<Item = &CityCount> {
        self.rows
            .iter()
            .filter(|r| r.latitude.is_some() && r.longitude.is_some())
    }
}

/// Record count per carrier, ordered by carrier name.
pub type CarrierCounts = BTreeMap<String, usize>;

/// Percentage per carrier; `None` where the rate is undefined.
pub type RateTable = BTreeMap<String, Option<f64>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CarrierRates {
    /// Delivered / all records.
    pub delivered_rate: RateTable,
    /// Delivered and delayed / delivered.
    pub delay_rate: RateTable,
    /// Delivered with packaging error / delivered.
    pub packaging_error_rate: RateTable,
}

/// Headline counters. Percentages are rounded to one decimal.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub delivered: usize,
    pub not_delivered: usize,
    pub delayed: usize,
    pub packaging_errors: usize,
    pub delivered_pct: Option<f64>,
    pub not_delivered_pct: Option<f64>,
    /// Relative to delivered records.
    pub delayed_pct: Option<f64>,
    /// Relative to delivered records.
    pub packaging_errors_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedCount {
    pub name: String,
    pub count: usize,
}

/// Arrival delay breakdown for one tracked residence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResidenceDelay {
    pub residence: String,
    pub delayed: usize,
    pub on_time: usize,
}

/// The four city maps of the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityMaps {
    pub delivered: CityAggregate,
    pub not_delivered: CityAggregate,
    pub delayed: CityAggregate,
    pub packaging_error: CityAggregate,
}

/// Everything the presentation layer draws, serialized as one JSON document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardReport {
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub cleaning: CleanReport,
    pub summary: Summary,
    pub top_cities: Vec<NamedCount>,
    pub top_carriers: Vec<NamedCount>,
    pub city_maps: CityMaps,
    pub carriers: CarrierCounts,
    pub carrier_rates: CarrierRates,
    /// Delivered and delayed records per carrier.
    pub delayed_by_carrier: CarrierCounts,
    /// Delivered records with a packaging error per carrier.
    pub packaging_errors_by_carrier: CarrierCounts,
    pub residences: Vec<NamedCount>,
    pub residence_delays: Vec<ResidenceDelay>,
    pub delivered_by_month: Vec<NamedCount>,
}
