//! Headline counters and the smaller breakdowns of the dashboard
//! (top cities and carriers, residences, months).

use chrono::Datelike;
use std::collections::{BTreeMap, HashMap};

use crate::analyzers::types::{NamedCount, ResidenceDelay, Summary};
use crate::analyzers::utility::{pct, round1};
use crate::config::DashboardConfig;
use crate::dates::month_name;
use crate::records::DeliveryRecord;

impl Summary {
    pub fn from_records(records: &[DeliveryRecord], config: &DashboardConfig) -> Self {
        let mut s = Summary {
            total: records.len(),
            ..Default::default()
        };

        for r in records {
            if config.is_delivered(&r.status) {
                s.delivered += 1;
            } else {
                s.not_delivered += 1;
            }

            if r.delayed() {
                s.delayed += 1;
            }

            if r.packaging_error {
                s.packaging_errors += 1;
            }
        }

        let rounded = |part, total| pct(part, total).map(round1);
        s.delivered_pct = rounded(s.delivered, s.total);
        s.not_delivered_pct = rounded(s.not_delivered, s.total);
        s.delayed_pct = rounded(s.delayed, s.delivered);
        s.packaging_errors_pct = rounded(s.packaging_errors, s.delivered);

        s
    }
}

/// Sorts by descending count, then by name.
fn ranked(counts: HashMap<&str, usize>) -> Vec<NamedCount> {
    let mut ranked: Vec<NamedCount> = counts
        .into_iter()
        .map(|(name, count)| NamedCount {
            name: name.to_string(),
            count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    ranked
}

fn count_by<'r, F>(records: &'r [DeliveryRecord], key: F) -> HashMap<&'r str, usize>
where
    F: Fn(&'r DeliveryRecord) -> Option<&'r str>,
{
    let mut counts = HashMap::new();
    for name in records.iter().filter_map(key) {
        *counts.entry(name).or_default() += 1;
    }
    counts
}

/// The `n` city names with the most records.
pub fn top_cities(records: &[DeliveryRecord], n: usize) -> Vec<NamedCount> {
    let mut ranked = ranked(count_by(records, |r| r.city.as_deref()));
    ranked.truncate(n);
    ranked
}

/// The `n` carriers with the most records.
pub fn top_carriers(records: &[DeliveryRecord], n: usize) -> Vec<NamedCount> {
    let mut ranked = ranked(count_by(records, |r| r.carrier.as_deref()));
    ranked.truncate(n);
    ranked
}

/// Records per residence; records without one count as individuals.
pub fn count_by_residence(records: &[DeliveryRecord], config: &DashboardConfig) -> Vec<NamedCount> {
    let individual = config.individual_residence.as_str();
    ranked(count_by(records, |r| Some(r.residence_category(individual))))
}

/// Arrival delays for each tracked residence, in configured order.
pub fn residence_delays(
    records: &[DeliveryRecord],
    config: &DashboardConfig,
) -> Vec<ResidenceDelay> {
    config
        .tracked_residences
        .iter()
        .map(|residence| {
            let mut entry = ResidenceDelay {
                residence: residence.clone(),
                delayed: 0,
                on_time: 0,
            };
            for r in records
                .iter()
                .filter(|r| r.residence.as_deref() == Some(residence.as_str()))
            {
                if r.residence_delayed() {
                    entry.delayed += 1;
                } else {
                    entry.on_time += 1;
                }
            }
            entry
        })
        .collect()
}

/// Delivered records per delivery month, in calendar order.
pub fn delivered_by_month(records: &[DeliveryRecord], config: &DashboardConfig) -> Vec<NamedCount> {
    let mut months: BTreeMap<u32, (&'static str, usize)> = BTreeMap::new();

    for r in records.iter().filter(|r| config.is_delivered(&r.status)) {
        if let Some(date) = r.delivery_date {
            months.entry(date.month()).or_insert((month_name(date), 0)).1 += 1;
        }
    }

    months
        .into_values()
        .map(|(name, count)| NamedCount {
            name: name.to_string(),
            count,
        })
        .collect()
}
