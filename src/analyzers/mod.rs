//! Delivery performance aggregation.
//!
//! This module groups cleaned records by postal code, carrier, residence and
//! month, computes the per-carrier rate tables, and assembles everything into
//! a [`types::DashboardReport`] for the presentation layer.

pub mod aggregate;
pub mod report;
pub mod summary;
pub mod types;
pub mod utility;

pub use aggregate::{Aggregator, count_by_carrier};
pub use types::{ConditionFilter, DashboardReport, StatusFilter};
