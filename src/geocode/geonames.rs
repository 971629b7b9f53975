//! GeoNames postal code dump, one place per line, tab separated, no header:
//!
//! | # | field        |
//! |---|--------------|
//! | 0 | country code |
//! | 1 | postal code  |
//! | 2 | place name   |
//! | 3..=8 | admin codes / names (unused) |
//! | 9 | latitude     |
//! | 10| longitude    |
//! | 11| accuracy     |

use anyhow::Result;
use csv::{ReaderBuilder, Trim};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, info};

use super::{GeocodeLookup, Place};
use crate::analyzers::utility::mean;
use crate::config::GeocoderConfig;
use crate::fetch::{HttpClient, fetch_bytes};

#[derive(Default)]
struct PlaceRows {
    names: Vec<String>,
    latitudes: Vec<f64>,
    longitudes: Vec<f64>,
}

/// In-memory postal code → [`Place`] index.
#[derive(Debug, Clone, Default)]
pub struct PostalIndex {
    places: HashMap<String, Place>,
}

impl PostalIndex {
    /// Builds the index from a GeoNames dump.
    ///
    /// Places sharing a postal code are merged: names are joined and the
    /// coordinates averaged. Codes with no usable coordinate are left out.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .trim(Trim::All)
            .from_reader(reader);

        let mut grouped: HashMap<String, PlaceRows> = HashMap::new();

        for result in rdr.records() {
            let record = result?;
            let Some(code) = record.get(1).filter(|c| !c.is_empty()) else {
                continue;
            };

            let entry = grouped.entry(code.to_string()).or_default();

            if let Some(name) = record.get(2).filter(|n| !n.is_empty()) {
                entry.names.push(name.to_string());
            }

            let coordinate = |i| record.get(i).and_then(|v| v.parse::<f64>().ok());
            if let (Some(lat), Some(lon)) = (coordinate(9), coordinate(10)) {
                entry.latitudes.push(lat);
                entry.longitudes.push(lon);
            }
        }

        let places: HashMap<String, Place> = grouped
            .into_iter()
            .filter(|(_, rows)| !rows.latitudes.is_empty())
            .map(|(code, rows)| {
                let place = Place {
                    latitude: mean(&rows.latitudes),
                    longitude: mean(&rows.longitudes),
                    place_name: rows.names.join(", "),
                };
                (code, place)
            })
            .collect();

        debug!(postal_codes = places.len(), "Postal code index built");
        Ok(Self { places })
    }

    /// Loads a dump from disk; `.gz` files are decompressed.
    pub fn from_path(path: &str) -> Result<Self> {
        let file = File::open(path)?;
        if path.ends_with(".gz") {
            Self::from_reader(GzDecoder::new(file))
        } else {
            Self::from_reader(file)
        }
    }

    /// Loads the dataset from the gzip cache, downloading and caching it
    /// first when the cache is absent.
    #[tracing::instrument(skip(client, config), fields(country = %config.country))]
    pub async fn fetch<C: HttpClient>(client: &C, config: &GeocoderConfig) -> Result<Self> {
        let cache_path = config.cache_path();

        if Path::new(&cache_path).exists() {
            debug!(path = %cache_path, "Using cached postal code dataset");
            return Self::from_path(&cache_path);
        }

        let url = config.url();
        info!(url = %url, "Downloading postal code dataset");
        let bytes = fetch_bytes(client, &url).await?;

        std::fs::create_dir_all(&config.cache_dir)?;
        write_cache(&cache_path, &bytes)?;
        info!(path = %cache_path, bytes = bytes.len(), "Postal code dataset cached");

        Self::from_reader(bytes.as_slice())
    }

    pub fn get(&self, postal_code: &str) -> Option<&Place> {
        self.places.get(postal_code)
    }

    pub fn len(&self) -> usize {
        self.places.len()
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }
}

/// Writes `bytes` gzip-compressed to `<path>.tmp`, then renames it to
/// `path`. `path` only ever holds a complete cache.
fn write_cache(path: &str, bytes: &[u8]) -> Result<()> {
    let tmp_path = format!("{path}.tmp");

    if let Err(err) = write_gzip(&tmp_path, bytes) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(err);
    }

    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

fn write_gzip(path: &str, bytes: &[u8]) -> Result<()> {
    let mut encoder = GzEncoder::new(File::create(path)?, Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()?.sync_all()?;
    Ok(())
}

impl GeocodeLookup for PostalIndex {
    fn lookup(&self, postal_codes: &[&str]) -> HashMap<String, Place> {
        self.places.lookup(postal_codes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::BasicClient;
    use async_trait::async_trait;
    use std::env;
    use std::fs;

    const DUMP: &str = "FR\t75001\tParis 01 Louvre\tÎle-de-France\t11\tParis\t75\tParis\t751\t48.8592\t2.3417\t5\n\
FR\t01000\tBourg-en-Bresse\tAuvergne-Rhône-Alpes\t84\tAin\t01\tBourg-en-Bresse\t012\t46.2\t5.2\t5\n\
FR\t01000\tSaint-Denis-lès-Bourg\tAuvergne-Rhône-Alpes\t84\tAin\t01\tBourg-en-Bresse\t012\t46.4\t5.4\t5\n\
FR\t99999\tNowhere\t\t\t\t\t\t\t\t\t\n";

    fn temp_path(name: &str) -> String {
        format!("{}/{}", env::temp_dir().display(), name)
    }

    struct UnreachableClient;

    #[async_trait]
    impl HttpClient for UnreachableClient {
        async fn execute(&self, _req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            panic!("cached dataset should not be downloaded");
        }
    }

    #[test]
    fn test_single_place() {
        let index = PostalIndex::from_reader(DUMP.as_bytes()).unwrap();
        let paris = index.get("75001").unwrap();

        assert_eq!(paris.place_name, "Paris 01 Louvre");
        assert!((paris.latitude - 48.8592).abs() < 1e-9);
    }

    #[test]
    fn test_shared_code_is_merged() {
        let index = PostalIndex::from_reader(DUMP.as_bytes()).unwrap();
        let bourg = index.get("01000").unwrap();

        assert_eq!(bourg.place_name, "Bourg-en-Bresse, Saint-Denis-lès-Bourg");
        assert!((bourg.latitude - 46.3).abs() < 1e-9);
        assert!((bourg.longitude - 5.3).abs() < 1e-9);
    }

    #[test]
    fn test_code_without_coordinates_is_unresolved() {
        let index = PostalIndex::from_reader(DUMP.as_bytes()).unwrap();
        assert_eq!(index.len(), 2);
        assert!(index.get("99999").is_none());

        let resolved = index.lookup(&["75001", "99999", "12345"]);
        assert_eq!(resolved.len(), 1);
        assert!(resolved.contains_key("75001"));
    }

    #[test]
    fn test_from_gzip_path() {
        let path = temp_path("delivery_report_test_postal.txt.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(DUMP.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let index = PostalIndex::from_path(&path).unwrap();
        assert_eq!(index.len(), 2);

        fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_fetch_uses_existing_cache() {
        let cache_dir = temp_path("delivery_report_test_cache");
        let config = GeocoderConfig {
            country: "FR".to_string(),
            url_template: "http://localhost:9/{country}.txt".to_string(),
            cache_dir: cache_dir.clone(),
        };
        fs::create_dir_all(&cache_dir).unwrap();
        let mut encoder =
            GzEncoder::new(File::create(config.cache_path()).unwrap(), Compression::default());
        encoder.write_all(DUMP.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let index = PostalIndex::fetch(&UnreachableClient, &config).await.unwrap();
        assert!(index.get("01000").is_some());

        fs::remove_dir_all(&cache_dir).unwrap();
    }

    #[test]
    fn test_write_cache_leaves_only_complete_file() {
        let path = temp_path("delivery_report_test_write_cache.txt.gz");
        let _ = fs::remove_file(&path);

        write_cache(&path, DUMP.as_bytes()).unwrap();

        assert!(!Path::new(&format!("{path}.tmp")).exists());
        assert_eq!(PostalIndex::from_path(&path).unwrap().len(), 2);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_failed_cache_write_leaves_nothing() {
        let dir = temp_path("delivery_report_test_missing_dir");
        let _ = fs::remove_dir_all(&dir);
        let path = format!("{dir}/postal_codes_FR.txt.gz");

        assert!(write_cache(&path, DUMP.as_bytes()).is_err());
        assert!(!Path::new(&path).exists());
        assert!(!Path::new(&format!("{path}.tmp")).exists());
    }

    #[tokio::test]
    async fn test_failed_download_leaves_no_cache() {
        let cache_dir = temp_path("delivery_report_test_failed_download");
        let _ = fs::remove_dir_all(&cache_dir);
        let config = GeocoderConfig {
            country: "FR".to_string(),
            url_template: "http://127.0.0.1:9/{country}.txt".to_string(),
            cache_dir: cache_dir.clone(),
        };
        let client = BasicClient::new().unwrap();

        assert!(PostalIndex::fetch(&client, &config).await.is_err());
        assert!(!Path::new(&config.cache_path()).exists());
        assert!(!Path::new(&format!("{}.tmp", config.cache_path())).exists());
    }
}
