use chrono::Utc;

use crate::analyzers::aggregate::{Aggregator, count_by_carrier};
use crate::analyzers::summary::{
    count_by_residence, delivered_by_month, residence_delays, top_carriers, top_cities,
};
use crate::analyzers::types::{
    CityMaps, ConditionFilter, DashboardReport, StatusFilter, Summary,
};
use crate::geocode::GeocodeLookup;
use crate::records::Cleaned;

impl DashboardReport {
    /// Runs every dashboard aggregation over one cleaned dataset.
    ///
    /// `top_n` bounds the most-frequent city and carrier lists.
    pub fn build<G: GeocodeLookup + ?Sized>(
        cleaned: &Cleaned,
        aggregator: &Aggregator<'_, G>,
        top_n: usize,
    ) -> Self {
        let config = aggregator.config();
        let records = cleaned.records.as_slice();

        let city_maps = CityMaps {
            delivered: aggregator.count_by_city(records, StatusFilter::Delivered, None),
            not_delivered: aggregator.count_by_city(records, StatusFilter::NotDelivered, None),
            delayed: aggregator.count_by_city(
                records,
                StatusFilter::Delivered,
                Some(ConditionFilter::Delayed),
            ),
            packaging_error: aggregator.count_by_city(
                records,
                StatusFilter::Delivered,
                Some(ConditionFilter::PackagingError),
            ),
        };

        DashboardReport {
            title: config.title.clone(),
            generated_at: Utc::now(),
            cleaning: cleaned.report.clone(),
            summary: Summary::from_records(records, config),
            top_cities: top_cities(records, top_n),
            top_carriers: top_carriers(records, top_n),
            city_maps,
            carriers: count_by_carrier(records),
            carrier_rates: aggregator.carrier_rates(records),
            delayed_by_carrier: aggregator.count_by_carrier(
                records,
                StatusFilter::Delivered,
                Some(ConditionFilter::Delayed),
            ),
            packaging_errors_by_carrier: aggregator.count_by_carrier(
                records,
                StatusFilter::Delivered,
                Some(ConditionFilter::PackagingError),
            ),
            residences: count_by_residence(records, config),
            residence_delays: residence_delays(records, config),
            delivered_by_month: delivered_by_month(records, config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DashboardConfig;
    use crate::geocode::NoGeocoder;
    use crate::parser::parse_sheet;
    use crate::records::clean;

    const SHEET: &str = "\
No de ligne;Code postal destinataire;Ville destinataire;Transporteur;Résidence;Status;Erreur de colissage/Manque;Date de ramasse;Date de livraison;Date arrivée client
1;75001;Paris;DPD;PV;Livré;non;2023-01-01;2023-01-04;2023-01-05
2;1000;Bourg-en-Bresse;Stuart;;Non livré;non;2023-01-01;;
3;75001;Paris;DPD;MMV;Livré;OUI;2023-02-01;2023-02-02;2023-02-06
4;;Lyon;DPD;;Livré;non;2023-02-01;2023-02-02;
";

    #[test]
    fn test_build_report() {
        let config = DashboardConfig::default();
        let sheet = parse_sheet(SHEET.as_bytes(), b';').unwrap();
        let cleaned = clean(&sheet, &config).unwrap();
        let aggregator = Aggregator::new(&config, &NoGeocoder);

        let report = DashboardReport::build(&cleaned, &aggregator, 5);

        assert_eq!(report.title, "Famileat - Dashboard livraisons");
        assert_eq!(report.cleaning.dropped_missing_postal_code, 1);
        assert_eq!(report.summary.total, 3);
        assert_eq!(report.summary.delivered, 2);
        assert_eq!(report.city_maps.delivered.count_for("75001"), 2);
        assert_eq!(report.city_maps.not_delivered.count_for("01000"), 1);
        assert_eq!(report.city_maps.delayed.total(), 1);
        assert_eq!(report.city_maps.packaging_error.total(), 1);
        assert_eq!(report.carriers["DPD"], 2);
        assert_eq!(report.carrier_rates.delivered_rate["DPD"], Some(100.0));
        assert_eq!(report.carrier_rates.delivered_rate["Stuart"], None);
        assert_eq!(report.delayed_by_carrier["DPD"], 1);
        assert_eq!(report.residence_delays[0].delayed, 0);
        assert_eq!(report.residence_delays[1].delayed, 1);
        assert_eq!(report.delivered_by_month.len(), 2);
    }
}
