// src/database/models.rs
use crate::{
    errors::AisTrackerError,
    models::{Mmsi, VesselPosition},
};

/// Row returned by the bounding box queries
#[derive(Debug, sqlx::FromRow)]
pub struct VesselRow {
    pub mmsi: i32,
    pub course: Option<f64>,
    pub lat: f64,
    pub lon: f64,
}

impl TryFrom<VesselRow> for VesselPosition {
    type Error = AisTrackerError;

    fn try_from(row: VesselRow) -> Result<Self, Self::Error> {
        Ok(VesselPosition {
            mmsi: Mmsi::try_from(row.mmsi)?,
            lat: row.lat,
            lon: row.lon,
            course: row.course,
        })
    }
}
