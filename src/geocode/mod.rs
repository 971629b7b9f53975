//! Postal code geocoding.
//!
//! [`GeocodeLookup`] is the black-box seam used by the city aggregation.
//! [`PostalIndex`] implements it over the GeoNames postal code dataset;
//! [`NoGeocoder`] resolves nothing, which leaves every coordinate empty.

mod geonames;

pub use geonames::PostalIndex;

use serde::Serialize;
use std::collections::HashMap;

/// Location resolved for one postal code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Place {
    pub latitude: f64,
    pub longitude: f64,
    /// Every place sharing the code, comma separated.
    pub place_name: String,
}

pub trait GeocodeLookup {
    /// Resolves `postal_codes`. Codes that cannot be resolved are simply
    /// absent from the result; that is not an error.
    fn lookup(&self, postal_codes: &[&str]) -> HashMap<String, Place>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoGeocoder;

impl GeocodeLookup for NoGeocoder {
    fn lookup(&self, _postal_codes: &[&str]) -> HashMap<String, Place> {
        HashMap::new()
    }
}

impl GeocodeLookup for HashMap<String, Place> {
    fn lookup(&self, postal_codes: &[&str]) -> HashMap<String, Place> {
        postal_codes
            .iter()
            .filter_map(|code| Some((code.to_string(), self.get(*code)?.clone())))
            .collect()
    }
}
