//! Data models.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AisTrackerError;
use crate::geo::GeoPoint;
use serde_helpers::*;

/// Wire name of the only message kind the tracker consumes
pub const POSITION_REPORT: &str = "PositionReport";

/// Maritime Mobile Service Identity (MMSI)
///
/// A unique nine-digit number for identifying vessels in AIS messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Mmsi(u32);

impl TryFrom<u32> for Mmsi {
    type Error = AisTrackerError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if value == 0 || value > 999_999_999 {
            return Err(AisTrackerError::InvalidMmsi(value.to_string()));
        }
        Ok(Self(value))
    }
}

impl TryFrom<i32> for Mmsi {
    type Error = AisTrackerError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        let value =
            u32::try_from(value).map_err(|_| AisTrackerError::InvalidMmsi(value.to_string()))?;
        Self::try_from(value)
    }
}

impl Mmsi {
    /// Get the raw MMSI value
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Mmsi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Latest known state of one vessel, the only persisted entity
#[derive(Debug, Clone, PartialEq)]
pub struct VesselState {
    pub mmsi: Mmsi,
    pub position: GeoPoint,
    /// Course over ground in degrees, None if not available
    pub course: Option<f64>,
    /// Last reported vessel name, may be empty
    pub name: String,
    /// Time the contributing report was generated
    pub last_seen: DateTime<Utc>,
}

/// One entry of a spatial query result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VesselPosition {
    pub mmsi: Mmsi,
    pub lat: f64,
    pub lon: f64,
    /// Serialized as `null` when unknown
    pub course: Option<f64>,
}

/// Position report decoded from the feed, not yet validated
#[derive(Debug, Clone, PartialEq)]
pub struct PositionReport {
    pub mmsi: Mmsi,
    pub latitude: f64,
    pub longitude: f64,
    pub course: Option<f64>,
    pub ship_name: Option<String>,
    /// Source-provided `time_utc`, normalized later by the pipeline
    pub report_time: Option<String>,
}

/// Feed message after the tagged decode step
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    PositionReport(PositionReport),
    /// Any other message kind, carrying its `MessageType`
    Other(String),
}

/// Message envelope as sent by the feed
///
/// See: https://aisstream.io/documentation#AISMessage
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "MessageType")]
    message_type: String,
    #[serde(rename = "Message", default)]
    message: serde_json::Map<String, serde_json::Value>,
    #[serde(rename = "MetaData", default)]
    metadata: RawMetaData,
}

#[derive(Debug, Default, Deserialize)]
struct RawMetaData {
    /// Vessel name, padded with spaces by the feed
    #[serde(
        rename = "ShipName",
        default,
        deserialize_with = "deserialize_trimmed_string"
    )]
    ship_name: Option<String>,
    /// Report time, e.g. `2022-12-29 18:22:32.318353 +0000 UTC`
    #[serde(default)]
    time_utc: Option<String>,
}

/// Position report body
///
/// See: https://aisstream.io/documentation#PositionReport
#[derive(Debug, Deserialize)]
struct RawPositionReport {
    #[serde(rename = "UserID")]
    user_id: u32,
    #[serde(rename = "Latitude")]
    latitude: f64,
    #[serde(rename = "Longitude")]
    longitude: f64,
    /// Course over ground in degrees, None if not available (360)
    #[serde(rename = "Cog", default, deserialize_with = "deserialize_cog")]
    cog: Option<f64>,
}

impl StreamMessage {
    /// Decode one raw frame into a typed message
    pub fn decode(payload: &[u8]) -> Result<Self, AisTrackerError> {
        let mut envelope: RawEnvelope = serde_json::from_slice(payload)?;

        if envelope.message_type != POSITION_REPORT {
            return Ok(StreamMessage::Other(envelope.message_type));
        }

        let body = envelope
            .message
            .remove(POSITION_REPORT)
            .ok_or_else(|| AisTrackerError::MissingMessageBody(envelope.message_type.clone()))?;
        let body: RawPositionReport = serde_json::from_value(body)?;

        Ok(StreamMessage::PositionReport(PositionReport {
            mmsi: Mmsi::try_from(body.user_id)?,
            latitude: body.latitude,
            longitude: body.longitude,
            course: body.cog,
            ship_name: envelope.metadata.ship_name,
            report_time: envelope.metadata.time_utc,
        }))
    }
}

/// Normalize a source-provided report time to UTC
///
/// Falls back to `received_at` when the source did not provide a time.
pub fn normalize_report_time(
    raw: Option<&str>,
    received_at: DateTime<Utc>,
) -> Result<DateTime<Utc>, AisTrackerError> {
    let raw = match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => raw,
        None => return Ok(received_at),
    };
    let stripped = raw.strip_suffix("UTC").map(str::trim_end).unwrap_or(raw);

    if let Ok(dt) = DateTime::parse_from_str(stripped, "%Y-%m-%d %H:%M:%S%.f %z") {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(stripped) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(stripped, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }

    Err(AisTrackerError::InvalidTimestamp(raw.to_string()))
}

/// Custom deserializers
mod serde_helpers {
    use serde::{self, Deserialize, Deserializer};

    pub fn deserialize_cog<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<f64>::deserialize(deserializer)?;
        Ok(value.filter(|v| (0.0..360.0).contains(v)))
    }

    pub fn deserialize_trimmed_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Option::<String>::deserialize(deserializer)?;
        Ok(s.and_then(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }))
    }
}
