//! Geocoding job: fills in coordinates of the operation location before the
//! operation is stored.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::engine::job::{Job, JobContext, JobPhase};
use crate::error::{ConfigError, JobError};
use crate::operation::{Operation, PropertyLocation};
use crate::services::Services;

/// Resolves an address to `(latitude, longitude)`.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, location: &PropertyLocation) -> Option<(f64, f64)>;
}

#[derive(Debug, Deserialize)]
struct GeocodeRecord {
    street: String,
    #[serde(default)]
    zip_code: String,
    #[serde(default)]
    city: String,
    latitude: f64,
    longitude: f64,
}

/// Geocoder backed by a fixed list of known addresses.
///
/// Lookup keys are street plus city, then street plus zip code, both
/// compared case-insensitively.
#[derive(Debug, Default)]
pub struct LookupTableGeocoder {
    table: HashMap<String, (f64, f64)>,
}

impl LookupTableGeocoder {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let records: Vec<GeocodeRecord> = serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;

        let mut geocoder = Self::default();
        for record in records {
            geocoder.insert(&record.street, &record.zip_code, &record.city, record.latitude, record.longitude);
        }
        Ok(geocoder)
    }

    pub fn insert(&mut self, street: &str, zip_code: &str, city: &str, latitude: f64, longitude: f64) {
        for place in [city, zip_code] {
            if !place.trim().is_empty() {
                self.table.insert(key(street, place), (latitude, longitude));
            }
        }
    }
}

fn key(street: &str, place: &str) -> String {
    format!("{}|{}", street.trim().to_lowercase(), place.trim().to_lowercase())
}

#[async_trait]
impl Geocoder for LookupTableGeocoder {
    async fn geocode(&self, location: &PropertyLocation) -> Option<(f64, f64)> {
        [&location.city, &location.zip_code]
            .into_iter()
            .filter(|place| !place.trim().is_empty())
            .find_map(|place| self.table.get(&key(&location.street, place)).copied())
    }
}

/// Pre-store job that geocodes the operation location.
///
/// Never overwrites coordinates that are already present.
#[derive(Default)]
pub struct GeocodingJob {
    geocoder: Option<Arc<dyn Geocoder>>,
}

impl GeocodingJob {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_geocoder(geocoder: Arc<dyn Geocoder>) -> Self {
        Self {
            geocoder: Some(geocoder),
        }
    }
}

#[async_trait]
impl Job for GeocodingJob {
    fn name(&self) -> &str {
        "Geocoding"
    }

    fn phase(&self) -> JobPhase {
        JobPhase::OnOperationSurfaced
    }

    async fn initialize(&mut self, services: &Services) -> bool {
        if self.geocoder.is_some() {
            return true;
        }
        let Some(path) = &services.config.geocodes_path else {
            warn!("Geocoding enabled but no geocode table configured");
            return false;
        };
        match LookupTableGeocoder::load(path) {
            Ok(geocoder) => {
                info!(path = %path.display(), "Loaded geocode table");
                self.geocoder = Some(Arc::new(geocoder));
                true
            }
            Err(e) => {
                error!(error = %e, "Could not load geocode table");
                false
            }
        }
    }

    async fn execute(&self, _ctx: &JobContext, operation: &mut Operation) -> Result<(), JobError> {
        let geocoder = self.geocoder.as_ref().ok_or_else(|| JobError::MissingCollaborator {
            name: self.name().to_string(),
            what: "geocoder".to_string(),
        })?;

        let location = &mut operation.einsatzort;
        if location.has_geo_coordinates() {
            debug!("Operation already has coordinates");
            return Ok(());
        }
        if !location.is_meaningful() {
            debug!("Operation location too vague to geocode");
            return Ok(());
        }

        match geocoder.geocode(location).await {
            Some((latitude, longitude)) => {
                location.geo_latitude = Some(latitude);
                location.geo_longitude = Some(longitude);
                info!(latitude, longitude, "Geocoded operation location");
            }
            None => error!(location = %location, "No coordinates found for operation location"),
        }
        Ok(())
    }
}
