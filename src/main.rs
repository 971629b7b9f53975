//! CLI entry point for the delivery report tool.
//!
//! Each subcommand reads one sheet (a workbook sheet or a delimited-text
//! export), cleans it, and answers a single request: the cleaned table, the full dashboard report, or one of the city
//! and carrier breakdowns.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use delivery_report::analyzers::{
    Aggregator, ConditionFilter, DashboardReport, StatusFilter, count_by_carrier,
};
use delivery_report::config::{DashboardConfig, GeocoderConfig};
use delivery_report::fetch::BasicClient;
use delivery_report::geocode::{GeocodeLookup, NoGeocoder, PostalIndex};
use delivery_report::output::{print_json, write_cleaned_file, write_json, write_rows};
use delivery_report::parser::read_input;
use delivery_report::workbook::sheet_names;
use delivery_report::records::{Cleaned, clean};
use serde_json::json;
use std::ffi::OsStr;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "delivery_report")]
#[command(about = "Clean delivery records and report delivery performance", long_about = None)]
struct Cli {
    /// JSON configuration file (column labels, status literals, ...)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Field delimiter of delimited-text input and CSV outputs
    #[arg(short, long, global = true, default_value_t = ';')]
    delimiter: char,

    /// Workbook sheet to read (required when the workbook has several)
    #[arg(long, global = true)]
    sheet: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GeocodeArgs {
    /// GeoNames postal code file (plain or .gz) used to place cities on a map
    #[arg(long, value_name = "FILE")]
    postal_codes: Option<String>,

    /// Download (or reuse the cached) GeoNames postal code dataset
    #[arg(long, default_value_t = false, conflicts_with = "postal_codes")]
    download_postal_codes: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the sheets of a workbook
    Sheets {
        #[arg(value_name = "WORKBOOK")]
        input: String,
    },
    /// Clean a sheet and write it back with derived columns
    Clean {
        #[arg(value_name = "SHEET")]
        input: String,

        /// CSV file to write cleaned records to
        #[arg(short, long, default_value = "cleaned.csv")]
        output: String,
    },
    /// Build the full dashboard report as JSON
    Report {
        #[arg(value_name = "SHEET")]
        input: String,

        /// JSON file to write the report to
        #[arg(short, long, default_value = "report.json")]
        output: String,

        /// How many cities and carriers the "most orders" lists keep
        #[arg(long, default_value_t = 10)]
        top: usize,

        #[command(flatten)]
        geocode: GeocodeArgs,
    },
    /// Count records per postal code for one selection
    ByCity {
        #[arg(value_name = "SHEET")]
        input: String,

        #[arg(short, long, value_enum, default_value_t = StatusFilter::Delivered)]
        status: StatusFilter,

        /// Only applies to delivered records
        #[arg(long, value_enum)]
        condition: Option<ConditionFilter>,

        /// CSV file to write the table to (logged as JSON otherwise)
        #[arg(short, long)]
        output: Option<String>,

        #[command(flatten)]
        geocode: GeocodeArgs,
    },
    /// Count records per carrier, with delivered / delay / packaging error rates
    ByCarrier {
        #[arg(value_name = "SHEET")]
        input: String,

        /// JSON file to write the tables to (logged otherwise)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/delivery_report.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("delivery_report.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    anyhow::ensure!(cli.delimiter.is_ascii(), "delimiter must be an ASCII character");
    let delimiter = cli.delimiter as u8;

    let config = match &cli.config {
        Some(path) => DashboardConfig::load(path)?,
        None => DashboardConfig::default(),
    };
    info!(title = %config.title, "Configuration loaded");

    let sheet = cli.sheet.as_deref();

    match cli.command {
        Commands::Sheets { input } => {
            for (position, name) in sheet_names(&input)?.iter().enumerate() {
                info!(position, sheet = %name, "Sheet");
            }
        }
        Commands::Clean { input, output } => {
            let cleaned = load_records(&input, sheet, delimiter, &config)?;
            write_cleaned_file(&output, &cleaned, &config.columns, delimiter)?;
            info!(output = %output, rows = cleaned.records.len(), "Cleaned records written");
        }
        Commands::Report {
            input,
            output,
            top,
            geocode,
        } => {
            let cleaned = load_records(&input, sheet, delimiter, &config)?;
            let index = load_postal_index(&geocode, &config.geocoder).await?;
            let geocoder: &dyn GeocodeLookup = match &index {
                Some(index) => index,
                None => &NoGeocoder,
            };
            let aggregator = Aggregator::new(&config, geocoder);

            let report = DashboardReport::build(&cleaned, &aggregator, top);
            write_json(&output, &report)?;

            let summary = &report.summary;
            info!(
                output = %output,
                total = summary.total,
                delivered = summary.delivered,
                not_delivered = summary.not_delivered,
                delayed = summary.delayed,
                packaging_errors = summary.packaging_errors,
                "Report written"
            );
        }
        Commands::ByCity {
            input,
            status,
            condition,
            output,
            geocode,
        } => {
            if condition.is_some() && status != StatusFilter::Delivered {
                warn!(?status, "Condition only applies to delivered records, ignoring it");
            }

            let cleaned = load_records(&input, sheet, delimiter, &config)?;
            let index = load_postal_index(&geocode, &config.geocoder).await?;
            let geocoder: &dyn GeocodeLookup = match &index {
                Some(index) => index,
                None => &NoGeocoder,
            };
            let aggregator = Aggregator::new(&config, geocoder);

            let by_city = aggregator.count_by_city(&cleaned.records, status, condition);
            let unlocated = by_city.rows.len() - by_city.located().count();
            if index.is_some() && unlocated > 0 {
                warn!(unlocated, "Postal codes without coordinates");
            }

            match output {
                Some(path) => {
                    write_rows(&path, &by_city.rows, delimiter)?;
                    info!(path = %path, label = %by_city.label, total = by_city.total(), "City table written");
                }
                None => print_json(&by_city)?,
            }
        }
        Commands::ByCarrier { input, output } => {
            let cleaned = load_records(&input, sheet, delimiter, &config)?;
            let aggregator = Aggregator::new(&config, &NoGeocoder);

            let tables = json!({
                "counts": count_by_carrier(&cleaned.records),
                "rates": aggregator.carrier_rates(&cleaned.records),
            });

            match output {
                Some(path) => {
                    write_json(&path, &tables)?;
                    info!(path = %path, "Carrier tables written");
                }
                None => print_json(&tables)?,
            }
        }
    }

    Ok(())
}

/// Reads and cleans a sheet, surfacing the cleaning diagnostics.
#[tracing::instrument(skip(config))]
fn load_records(
    input: &str,
    sheet: Option<&str>,
    delimiter: u8,
    config: &DashboardConfig,
) -> Result<Cleaned> {
    let sheet = read_input(input, sheet, delimiter)?;
    let cleaned = clean(&sheet, config)?;
    let report = &cleaned.report;

    if report.dropped_missing_postal_code > 0 {
        warn!(
            dropped = report.dropped_missing_postal_code,
            "Rows ignored: destination postal code missing"
        );
    }
    if report.dropped_invalid_postal_code > 0 {
        warn!(
            dropped = report.dropped_invalid_postal_code,
            "Rows ignored: destination postal code is not a 5-digit code"
        );
    }

    let unparsable = report.unparsable_pickup_dates
        + report.unparsable_delivery_dates
        + report.unparsable_customer_arrival_dates;
    if unparsable > 0 {
        warn!(
            pickup = report.unparsable_pickup_dates,
            delivery = report.unparsable_delivery_dates,
            customer_arrival = report.unparsable_customer_arrival_dates,
            "Unparsable dates treated as missing"
        );
    }

    info!(
        input_rows = report.input_rows,
        duplicates = report.duplicates_removed,
        records = cleaned.records.len(),
        "Sheet cleaned"
    );

    Ok(cleaned)
}

/// Loads the postal code index requested on the command line, if any.
async fn load_postal_index(
    args: &GeocodeArgs,
    config: &GeocoderConfig,
) -> Result<Option<PostalIndex>> {
    let index = if let Some(path) = &args.postal_codes {
        PostalIndex::from_path(path)?
    } else if args.download_postal_codes {
        let client = BasicClient::new()?;
        PostalIndex::fetch(&client, config).await?
    } else {
        return Ok(None);
    };

    info!(postal_codes = index.len(), "Postal code index loaded");
    Ok(Some(index))
}
