//! Spatial query service over the live vessel state

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::info;

use crate::{
    database::VesselStore, errors::AisTrackerError, geo::BoundingBox, models::VesselPosition,
};

/// Answers bounding box lookups filtered by freshness
pub struct VesselQueryService {
    store: Arc<dyn VesselStore>,
    freshness_window: chrono::Duration,
}

impl VesselQueryService {
    pub fn new(
        store: Arc<dyn VesselStore>,
        freshness_window: Duration,
    ) -> Result<Self, AisTrackerError> {
        let freshness_window = chrono::Duration::from_std(freshness_window).map_err(|e| {
            AisTrackerError::ConfigurationError {
                message: format!("Invalid freshness window: {}", e),
            }
        })?;
        Ok(Self {
            store,
            freshness_window,
        })
    }

    /// Vessels inside the box, last seen within the freshness window.
    ///
    /// Coordinates are validated before the store is touched. `min_lon >
    /// max_lon` selects a box wrapping across the antimeridian.
    pub async fn query(
        &self,
        min_lon: f64,
        min_lat: f64,
        max_lon: f64,
        max_lat: f64,
    ) -> Result<Vec<VesselPosition>, AisTrackerError> {
        let bbox = BoundingBox::new(min_lon, min_lat, max_lon, max_lat)?;
        let seen_since = Utc::now() - self.freshness_window;

        info!(
            "Querying vessels for bbox: [{}, {}, {}, {}]",
            min_lon, min_lat, max_lon, max_lat
        );
        let vessels = self.store.vessels_in_bbox(&bbox, seen_since).await?;
        info!(
            "Found {} vessels for bbox: [{}, {}, {}, {}]",
            vessels.len(),
            min_lon,
            min_lat,
            max_lon,
            max_lat
        );

        Ok(vessels)
    }
}
