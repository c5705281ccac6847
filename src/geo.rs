//! Geographic primitives: validated points and bounding boxes.

use crate::errors::AisTrackerError;

pub const MIN_LATITUDE: f64 = -90.0;
pub const MAX_LATITUDE: f64 = 90.0;
pub const MIN_LONGITUDE: f64 = -180.0;
pub const MAX_LONGITUDE: f64 = 180.0;

/// Check that a coordinate pair lies within WGS84 bounds.
///
/// NaN fails both range checks and is rejected.
pub fn is_valid_position(latitude: f64, longitude: f64) -> bool {
    is_valid_latitude(latitude) && is_valid_longitude(longitude)
}

pub fn is_valid_latitude(latitude: f64) -> bool {
    (MIN_LATITUDE..=MAX_LATITUDE).contains(&latitude)
}

pub fn is_valid_longitude(longitude: f64) -> bool {
    (MIN_LONGITUDE..=MAX_LONGITUDE).contains(&longitude)
}

/// WGS84 point, always within geographic bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    lon: f64,
    lat: f64,
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Result<Self, AisTrackerError> {
        if !is_valid_position(latitude, longitude) {
            return Err(AisTrackerError::InvalidPosition {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            lon: longitude,
            lat: latitude,
        })
    }

    pub fn longitude(&self) -> f64 {
        self.lon
    }

    pub fn latitude(&self) -> f64 {
        self.lat
    }
}

/// Rectangle in longitude/latitude used to scope a spatial query.
///
/// `min_lon > max_lon` denotes a box that wraps across the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    min_lon: f64,
    min_lat: f64,
    max_lon: f64,
    max_lat: f64,
}

/// Non-wrapping rectangle, `min_lon <= max_lon`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn new(
        min_lon: f64,
        min_lat: f64,
        max_lon: f64,
        max_lat: f64,
    ) -> Result<Self, AisTrackerError> {
        for (name, value) in [("min-lon", min_lon), ("max-lon", max_lon)] {
            if !is_valid_longitude(value) {
                return Err(AisTrackerError::InvalidBoundingBox(format!(
                    "{} must be between -180 and 180, got {}",
                    name, value
                )));
            }
        }
        for (name, value) in [("min-lat", min_lat), ("max-lat", max_lat)] {
            if !is_valid_latitude(value) {
                return Err(AisTrackerError::InvalidBoundingBox(format!(
                    "{} must be between -90 and 90, got {}",
                    name, value
                )));
            }
        }
        if min_lat > max_lat {
            return Err(AisTrackerError::InvalidBoundingBox(format!(
                "min-lat {} is greater than max-lat {}",
                min_lat, max_lat
            )));
        }

        Ok(Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        })
    }

    pub fn crosses_antimeridian(&self) -> bool {
        self.min_lon > self.max_lon
    }

    /// Split into one or two non-wrapping envelopes covering the same area
    pub fn envelopes(&self) -> Vec<Envelope> {
        if self.crosses_antimeridian() {
            vec![
                Envelope {
                    min_lon: self.min_lon,
                    min_lat: self.min_lat,
                    max_lon: MAX_LONGITUDE,
                    max_lat: self.max_lat,
                },
                Envelope {
                    min_lon: MIN_LONGITUDE,
                    min_lat: self.min_lat,
                    max_lon: self.max_lon,
                    max_lat: self.max_lat,
                },
            ]
        } else {
            vec![Envelope {
                min_lon: self.min_lon,
                min_lat: self.min_lat,
                max_lon: self.max_lon,
                max_lat: self.max_lat,
            }]
        }
    }

    /// Boundary-inclusive containment test
    pub fn contains(&self, point: &GeoPoint) -> bool {
        self.envelopes().iter().any(|e| e.contains(point))
    }
}

impl Envelope {
    pub fn contains(&self, point: &GeoPoint) -> bool {
        (self.min_lon..=self.max_lon).contains(&point.longitude())
            && (self.min_lat..=self.max_lat).contains(&point.latitude())
    }
}
