use std::collections::{BTreeMap, HashMap};

use crate::analyzers::types::{
    CarrierCounts, CarrierRates, CityAggregate, CityCount, ConditionFilter, RateTable,
    StatusFilter,
};
use crate::analyzers::utility::pct;
use crate::config::DashboardConfig;
use crate::geocode::GeocodeLookup;
use crate::records::DeliveryRecord;

/// Counts records per carrier. Records without a carrier are not counted.
pub fn count_by_carrier<'r, I>(records: I) -> CarrierCounts
where
    I: IntoIterator<Item = &'r DeliveryRecord>,
{
    let mut counts = CarrierCounts::new();
    for carrier in records.into_iter().filter_map(|r| r.carrier.as_deref()) {
        *counts.entry(carrier.to_string()).or_default() += 1;
    }
    counts
}

/// `numerator / denominator * 100` per carrier, over the union of carriers.
///
/// A carrier missing from either side (a zero count) has an undefined rate.
pub fn rate_table(numerator: &CarrierCounts, denominator: &CarrierCounts) -> RateTable {
    numerator
        .keys()
        .chain(denominator.keys())
        .map(|carrier| {
            let n = numerator.get(carrier).copied().unwrap_or(0);
            let d = denominator.get(carrier).copied().unwrap_or(0);
            let rate = if n == 0 { None } else { pct(n, d) };
            (carrier.clone(), rate)
        })
        .collect()
}

/// First non-empty city seen for each postal code.
pub fn canonical_cities(records: &[DeliveryRecord]) -> HashMap<&str, &str> {
    let mut cities = HashMap::new();
    for r in records {
        if let Some(city) = r.city.as_deref() {
            cities.entry(r.postal_code.as_str()).or_insert(city);
        }
    }
    cities
}

/// Stateless aggregations over cleaned records.
///
/// Holds the immutable configuration (delivered literal, count labels) and
/// the geocoder used for the city join; every call is a pure function of its
/// arguments.
pub struct Aggregator<'a, G: GeocodeLookup + ?Sized> {
    config: &'a DashboardConfig,
    geocoder: &'a G,
}

impl<'a, G: GeocodeLookup + ?Sized> Aggregator<'a, G> {
    pub fn new(config: &'a DashboardConfig, geocoder: &'a G) -> Self {
        Self { config, geocoder }
    }

    pub fn config(&self) -> &DashboardConfig {
        self.config
    }

    pub fn is_delivered(&self, record: &DeliveryRecord) -> bool {
        self.config.is_delivered(&record.status)
    }

    pub fn matches(
        &self,
        record: &DeliveryRecord,
        status: StatusFilter,
        condition: Option<ConditionFilter>,
    ) -> bool {
        match status {
            StatusFilter::All => true,
            StatusFilter::NotDelivered => !self.is_delivered(record),
            StatusFilter::Delivered => {
                self.is_delivered(record)
                    && match condition {
                        None => true,
                        Some(ConditionFilter::Delayed) => record.delayed(),
                        Some(ConditionFilter::PackagingError) => record.packaging_error,
                    }
            }
        }
    }

    pub fn select<'r>(
        &self,
        records: &'r [DeliveryRecord],
        status: StatusFilter,
        condition: Option<ConditionFilter>,
    ) -> Vec<&'r DeliveryRecord> {
        records
            .iter()
            .filter(|r| self.matches(r, status, condition))
            .collect()
    }

    /// Count column name for a selection.
    pub fn label(&self, status: StatusFilter, condition: Option<ConditionFilter>) -> &str {
        let labels = &self.config.count_labels;
        match (status, condition) {
            (StatusFilter::All, _) => labels.all.as_str(),
            (StatusFilter::NotDelivered, _) => labels.not_delivered.as_str(),
            (StatusFilter::Delivered, None) => labels.delivered.as_str(),
            (StatusFilter::Delivered, Some(ConditionFilter::Delayed)) => labels.delayed.as_str(),
            (StatusFilter::Delivered, Some(ConditionFilter::PackagingError)) => {
                labels.packaging_error.as_str()
            }
        }
    }

    /// Counts selected records per postal code.
    ///
    /// The city name comes from the whole dataset, so every code gets one
    /// canonical name even when source rows disagree. Codes the geocoder
    /// cannot resolve keep empty coordinates and are never dropped.
    pub fn count_by_city(
        &self,
        records: &[DeliveryRecord],
        status: StatusFilter,
        condition: Option<ConditionFilter>,
    ) -> CityAggregate {
        let condition = match status {
            StatusFilter::Delivered => condition,
            _ => None,
        };

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for r in records.iter().filter(|r| self.matches(r, status, condition)) {
            *counts.entry(r.postal_code.as_str()).or_default() += 1;
        }

        let cities = canonical_cities(records);
        let codes: Vec<&str> = counts.keys().copied().collect();
        let places = self.geocoder.lookup(&codes);

        let rows = counts
            .into_iter()
            .map(|(code, count)| {
                let place = places.get(code);
                CityCount {
                    postal_code: code.to_string(),
                    city: cities.get(code).map(|c| c.to_string()),
                    count,
                    latitude: place.map(|p| p.latitude),
                    longitude: place.map(|p| p.longitude),
                    place_name: place.map(|p| p.place_name.clone()),
                }
            })
            .collect();

        CityAggregate {
            label: self.label(status, condition).to_string(),
            status,
            condition,
            rows,
        }
    }

    /// Carrier counts for one selection.
    pub fn count_by_carrier(
        &self,
        records: &[DeliveryRecord],
        status: StatusFilter,
        condition: Option<ConditionFilter>,
    ) -> CarrierCounts {
        count_by_carrier(
            records
                .iter()
                .filter(|r| self.matches(r, status, condition)),
        )
    }

    pub fn carrier_rates(&self, records: &[DeliveryRecord]) -> CarrierRates {
        let all = count_by_carrier(records);
        let delivered = self.count_by_carrier(records, StatusFilter::Delivered, None);
        let delayed = self.count_by_carrier(
            records,
            StatusFilter::Delivered,
            Some(ConditionFilter::Delayed),
        );
        let packaging = self.count_by_carrier(
            records,
            StatusFilter::Delivered,
            Some(ConditionFilter::PackagingError),
        );

        CarrierRates {
            delivered_rate: rate_table(&delivered, &all),
            delay_rate: rate_table(&delayed, &delivered),
            packaging_error_rate: rate_table(&packaging, &delivered),
        }
    }
}
