//! Ingestion pipeline: decode, validate, normalize and store feed messages

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::{
    database::VesselStore,
    geo::GeoPoint,
    models::{normalize_report_time, Mmsi, StreamMessage, VesselState},
    stream::MessageHandler,
};

/// What happened to one inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Stored(Mmsi),
    /// Recognized envelope of another message kind
    Ignored(String),
    /// Frame could not be decoded into a known shape
    Malformed,
    InvalidPosition(Mmsi),
    InvalidTimestamp(Mmsi),
    StoreFailed(Mmsi),
}

/// Message callback of the feed supervisor
pub struct IngestionPipeline {
    store: Arc<dyn VesselStore>,
}

impl IngestionPipeline {
    pub fn new(store: Arc<dyn VesselStore>) -> Self {
        Self { store }
    }

    /// Process one raw frame. Failures are logged here and never propagate.
    pub async fn process(&self, payload: &[u8]) -> IngestOutcome {
        let received_at = Utc::now();

        let report = match StreamMessage::decode(payload) {
            Ok(StreamMessage::PositionReport(report)) => report,
            Ok(StreamMessage::Other(message_type)) => {
                info!("Received non-PositionReport message type: {}", message_type);
                return IngestOutcome::Ignored(message_type);
            }
            Err(e) => {
                warn!(
                    "Failed to decode message: {}, raw data: {}",
                    e,
                    String::from_utf8_lossy(payload)
                );
                return IngestOutcome::Malformed;
            }
        };

        let position = match GeoPoint::new(report.longitude, report.latitude) {
            Ok(position) => position,
            Err(_) => {
                warn!(
                    "Invalid coordinates for MMSI {}: lat {}, lon {}, skipping",
                    report.mmsi, report.latitude, report.longitude
                );
                return IngestOutcome::InvalidPosition(report.mmsi);
            }
        };

        let last_seen = match normalize_report_time(report.report_time.as_deref(), received_at) {
            Ok(last_seen) => last_seen,
            Err(e) => {
                warn!("Invalid report time for MMSI {}: {}, skipping", report.mmsi, e);
                return IngestOutcome::InvalidTimestamp(report.mmsi);
            }
        };

        let vessel = VesselState {
            mmsi: report.mmsi,
            position,
            course: report.course,
            name: report.ship_name.unwrap_or_default(),
            last_seen,
        };

        match self.store.upsert_vessel(&vessel).await {
            Ok(()) => {
                debug!("Upserted position for MMSI {}", vessel.mmsi);
                IngestOutcome::Stored(vessel.mmsi)
            }
            Err(e) => {
                error!(mmsi = %vessel.mmsi, "Error upserting data for MMSI {}: {}", vessel.mmsi, e);
                IngestOutcome::StoreFailed(vessel.mmsi)
            }
        }
    }
}

#[async_trait]
impl MessageHandler for IngestionPipeline {
    async fn handle_message(&self, payload: &[u8]) {
        self.process(payload).await;
    }
}
