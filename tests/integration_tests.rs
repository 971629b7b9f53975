use delivery_report::analyzers::{Aggregator, ConditionFilter, DashboardReport, StatusFilter};
use delivery_report::config::DashboardConfig;
use delivery_report::error::SheetError;
use delivery_report::geocode::{NoGeocoder, PostalIndex};
use delivery_report::output::write_cleaned_csv;
use delivery_report::parser::{parse_sheet, read_input, read_sheet};
use delivery_report::records::{Cleaned, clean};
use delivery_report::workbook::sheet_names;

const DELIVERIES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/deliveries.csv");
const WORKBOOK: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/deliveries.xlsx");
const POSTAL_CODES: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/tests/fixtures/postal_codes_fr.txt"
);

fn load(config: &DashboardConfig) -> Cleaned {
    let sheet = read_sheet(DELIVERIES, b';').expect("Failed to read fixture");
    clean(&sheet, config).expect("Failed to clean fixture")
}

#[test]
fn test_cleaning_diagnostics() {
    let cleaned = load(&DashboardConfig::default());
    let report = &cleaned.report;

    assert_eq!(report.input_rows, 11);
    assert_eq!(report.duplicates_removed, 1);
    assert_eq!(report.dropped_missing_postal_code, 1);
    assert_eq!(report.dropped_invalid_postal_code, 0);
    assert_eq!(report.unparsable_delivery_dates, 1);
    assert_eq!(cleaned.records.len(), 8);
    assert!(cleaned.records.iter().all(|r| r.postal_code.len() == 5));
    assert_eq!(cleaned.extra_columns, vec!["No de ligne"]);
}

#[test]
fn test_full_pipeline() {
    let config = DashboardConfig::default();
    let cleaned = load(&config);
    let index = PostalIndex::from_path(POSTAL_CODES).expect("Failed to load postal codes");
    let aggregator = Aggregator::new(&config, &index);

    let report = DashboardReport::build(&cleaned, &aggregator, 2);

    let summary = &report.summary;
    assert_eq!(summary.total, 8);
    assert_eq!(summary.delivered, 5);
    assert_eq!(summary.not_delivered, 3);
    assert_eq!(summary.delayed, 2);
    assert_eq!(summary.packaging_errors, 2);
    assert_eq!(summary.delivered_pct, Some(62.5));
    assert_eq!(summary.delayed_pct, Some(40.0));

    let delivered = &report.city_maps.delivered;
    assert_eq!(delivered.count_for("75001"), 2);
    assert_eq!(delivered.count_for("01000"), 1);
    assert_eq!(delivered.total(), 5);

    let bourg = delivered.rows.iter().find(|r| r.postal_code == "01000").unwrap();
    assert_eq!(bourg.city.as_deref(), Some("Bourg-en-Bresse"));
    assert_eq!(
        bourg.place_name.as_deref(),
        Some("Bourg-en-Bresse, Saint-Denis-lès-Bourg")
    );

    // Bordeaux is not in the postal code file: kept, without coordinates
    let bordeaux = delivered.rows.iter().find(|r| r.postal_code == "33000").unwrap();
    assert_eq!(bordeaux.count, 1);
    assert_eq!(bordeaux.latitude, None);
    assert_eq!(delivered.located().count(), 3);

    assert_eq!(report.city_maps.not_delivered.count_for("69001"), 2);
    assert_eq!(report.city_maps.delayed.total(), 2);
    assert_eq!(report.city_maps.packaging_error.count_for("13001"), 1);

    assert_eq!(report.carriers.len(), 4);
    assert_eq!(report.carrier_rates.delivered_rate["Colissimo"], Some(50.0));
    assert_eq!(report.carrier_rates.delivered_rate["Stuart"], None);
    assert_eq!(report.carrier_rates.delay_rate["Chronopost"], Some(50.0));
    assert_eq!(report.carrier_rates.packaging_error_rate["DPD"], None);

    let top: Vec<_> = report.top_cities.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(top, vec!["Lyon", "Paris"]);

    assert_eq!(report.residences[0].name, "particuliers");
    assert_eq!(report.residences[0].count, 5);
    assert_eq!(report.residence_delays[0].on_time, 2);
    assert_eq!(report.residence_delays[1].delayed, 1);

    let months: Vec<_> = report
        .delivered_by_month
        .iter()
        .map(|m| (m.name.as_str(), m.count))
        .collect();
    assert_eq!(months, vec![("January", 3), ("February", 1)]);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["city_maps"]["delayed"]["label"], "nbre_colis_livres_Retard");
}

#[test]
fn test_partition_by_status() {
    let config = DashboardConfig::default();
    let cleaned = load(&config);
    let aggregator = Aggregator::new(&config, &NoGeocoder);

    let all = aggregator.count_by_city(&cleaned.records, StatusFilter::All, None);
    let delivered = aggregator.count_by_city(&cleaned.records, StatusFilter::Delivered, None);
    let not_delivered =
        aggregator.count_by_city(&cleaned.records, StatusFilter::NotDelivered, None);

    for row in &all.rows {
        assert_eq!(
            row.count,
            delivered.count_for(&row.postal_code) + not_delivered.count_for(&row.postal_code),
            "postal code {}",
            row.postal_code
        );
    }
    assert_eq!(all.total(), delivered.total() + not_delivered.total());

    let late = aggregator.count_by_city(
        &cleaned.records,
        StatusFilter::Delivered,
        Some(ConditionFilter::Delayed),
    );
    assert!(late.total() <= delivered.total());
}

#[test]
fn test_cleaned_output_cleans_to_itself() {
    let config = DashboardConfig::default();
    let cleaned = load(&config);

    let mut buf = Vec::new();
    write_cleaned_csv(&mut buf, &cleaned, &config.columns, b';').unwrap();
    let sheet = parse_sheet(buf.as_slice(), b';').unwrap();
    let again = clean(&sheet, &config).unwrap();

    assert_eq!(again.records, cleaned.records);
    assert_eq!(again.report.dropped_rows(), 0);
    assert_eq!(again.report.duplicates_removed, 0);
}

#[test]
fn test_missing_column_is_fatal() {
    let config = DashboardConfig::default();
    let input = "Code postal destinataire;Status\n75001;Livré\n";
    let sheet = parse_sheet(input.as_bytes(), b';').unwrap();

    let err = clean(&sheet, &config).unwrap_err();
    match err {
        SheetError::MissingColumns(columns) => {
            assert!(columns.contains(&"Date de livraison".to_string()));
            assert!(!columns.contains(&"Status".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_workbook_sheets_are_listed() {
    let names = sheet_names(WORKBOOK).expect("Failed to open workbook");
    assert_eq!(names, vec!["Livraisons", "Notes"]);
}

#[test]
fn test_workbook_sheet_is_cleaned() {
    let config = DashboardConfig::default();
    let sheet = read_input(WORKBOOK, Some("Livraisons"), b';').expect("Failed to read workbook");
    let cleaned = clean(&sheet, &config).expect("Failed to clean workbook sheet");

    assert_eq!(cleaned.report.input_rows, 3);
    assert_eq!(cleaned.report.dropped_missing_postal_code, 1);
    assert_eq!(cleaned.records.len(), 2);

    // numeric postal code cell, padded back to 5 characters
    let bourg = &cleaned.records[0];
    assert_eq!(bourg.postal_code, "01000");
    assert!(bourg.packaging_error);
    assert_eq!(bourg.delivery_delay_days(), Some(3));
    assert_eq!(bourg.extra, vec!["1"]);

    assert_eq!(cleaned.records[1].postal_code, "75001");
    assert_eq!(cleaned.records[1].residence.as_deref(), Some("PV"));
}

#[test]
fn test_workbook_requires_sheet_choice() {
    let err = read_input(WORKBOOK, None, b';').unwrap_err();
    match err.downcast_ref::<SheetError>() {
        Some(SheetError::SheetNotSelected(available)) => {
            assert_eq!(available, &vec!["Livraisons".to_string(), "Notes".to_string()]);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let err = read_input(WORKBOOK, Some("Mars"), b';').unwrap_err();
    assert!(err.to_string().contains("Livraisons, Notes"));
}

#[test]
fn test_other_sheet_misses_required_columns() {
    let sheet = read_input(WORKBOOK, Some("Notes"), b';').unwrap();
    let err = clean(&sheet, &DashboardConfig::default()).unwrap_err();
    assert!(matches!(err, SheetError::MissingColumns(columns) if columns.len() == 6));
}
