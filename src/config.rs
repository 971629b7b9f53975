//! Immutable dashboard configuration.
//!
//! Everything that used to be ambient (page title, column labels, the
//! status-to-count-column table) lives in [`DashboardConfig`] and is passed
//! explicitly to the cleaner and the aggregator.
//!
//! Stored as a JSON object on disk; every key is optional:
//! ```json
//! {
//!   "title": "Famileat - Dashboard livraisons",
//!   "delivered_status": "Livré",
//!   "tracked_residences": ["PV", "MMV"]
//! }
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Column labels of the upstream sheet.
///
/// These are part of the contract with the data source, so the defaults are
/// the French labels verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub postal_code: String,
    pub city: String,
    pub carrier: String,
    pub residence: String,
    pub status: String,
    pub packaging_flag: String,
    pub pickup_date: String,
    pub delivery_date: String,
    pub customer_arrival_date: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            postal_code: "Code postal destinataire".to_string(),
            city: "Ville destinataire".to_string(),
            carrier: "Transporteur".to_string(),
            residence: "Résidence".to_string(),
            status: "Status".to_string(),
            packaging_flag: "Erreur de colissage/Manque".to_string(),
            pickup_date: "Date de ramasse".to_string(),
            delivery_date: "Date de livraison".to_string(),
            customer_arrival_date: "Date arrivée client".to_string(),
        }
    }
}

impl ColumnNames {
    /// Columns without which a sheet cannot be cleaned.
    pub fn required(&self) -> [&str; 6] {
        [
            self.postal_code.as_str(),
            self.packaging_flag.as_str(),
            self.delivery_date.as_str(),
            self.customer_arrival_date.as_str(),
            self.pickup_date.as_str(),
            self.status.as_str(),
        ]
    }
}

/// Count-column label for each map selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CountLabels {
    pub all: String,
    pub delivered: String,
    pub not_delivered: String,
    pub delayed: String,
    pub packaging_error: String,
}

impl Default for CountLabels {
    fn default() -> Self {
        Self {
            all: "nbre_colis".to_string(),
            delivered: "nbre_colis_livres".to_string(),
            not_delivered: "nbre_colis_non_livres".to_string(),
            delayed: "nbre_colis_livres_Retard".to_string(),
            packaging_error: "nbre_colis_livres_Erreur colisage".to_string(),
        }
    }
}

/// Where the GeoNames postal code dataset comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    pub country: String,
    /// `{country}` is substituted with [`GeocoderConfig::country`].
    pub url_template: String,
    pub cache_dir: String,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            country: "FR".to_string(),
            url_template: "https://symerio.github.io/postal-codes-data/data/geonames/{country}.txt"
                .to_string(),
            cache_dir: "cache".to_string(),
        }
    }
}

impl GeocoderConfig {
    pub fn url(&self) -> String {
        self.url_template.replace("{country}", &self.country)
    }

    pub fn cache_path(&self) -> String {
        format!("{}/postal_codes_{}.txt.gz", self.cache_dir, self.country)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub title: String,
    pub columns: ColumnNames,
    /// The only status value counted as delivered. Compared exactly.
    pub delivered_status: String,
    /// Packaging flag value meaning "error", compared lower-cased.
    pub affirmative: String,
    /// Category reported for records without a residence.
    pub individual_residence: String,
    /// Residences broken down by arrival delay.
    pub tracked_residences: Vec<String>,
    /// Tried in order; the first successful parse wins.
    pub date_formats: Vec<String>,
    pub count_labels: CountLabels,
    pub geocoder: GeocoderConfig,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            title: "Famileat - Dashboard livraisons".to_string(),
            columns: ColumnNames::default(),
            delivered_status: "Livré".to_string(),
            affirmative: "oui".to_string(),
            individual_residence: "particuliers".to_string(),
            tracked_residences: vec!["PV".to_string(), "MMV".to_string()],
            date_formats: vec![
                "%Y-%m-%d".to_string(),
                "%Y-%m-%d %H:%M:%S".to_string(),
                "%Y-%m-%dT%H:%M:%S".to_string(),
                "%d/%m/%Y".to_string(),
                "%d/%m/%Y %H:%M:%S".to_string(),
            ],
            count_labels: CountLabels::default(),
            geocoder: GeocoderConfig::default(),
        }
    }
}

impl DashboardConfig {
    /// Loads the config from a JSON file at `path`. Missing keys keep their defaults.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: DashboardConfig = serde_json::from_str(content)?;
        anyhow::ensure!(
            !config.delivered_status.is_empty(),
            "delivered_status must not be empty"
        );
        anyhow::ensure!(!config.date_formats.is_empty(), "date_formats must not be empty");
        Ok(config)
    }

    pub fn is_delivered(&self, status: &str) -> bool {
        status == self.delivered_status
    }
}
