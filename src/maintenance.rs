//! Periodic deletion of vessels not seen for a while

use std::sync::Arc;

use chrono::Utc;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info};

use crate::{config::MaintenanceConfig, database::VesselStore, errors::AisTrackerError};

/// Delete vessels older than `max_age`, returning the number removed
pub async fn sweep(
    store: &dyn VesselStore,
    max_age: chrono::Duration,
) -> Result<u64, AisTrackerError> {
    let deleted = store.delete_stale(Utc::now() - max_age).await?;
    Ok(deleted)
}

/// Sweep once immediately, then every `config.interval`
pub async fn run_maintenance(
    store: Arc<dyn VesselStore>,
    config: MaintenanceConfig,
) -> Result<(), AisTrackerError> {
    let max_age = chrono::Duration::from_std(config.max_age).map_err(|e| {
        AisTrackerError::ConfigurationError {
            message: format!("Invalid maintenance max_age: {}", e),
        }
    })?;

    info!(
        "Scheduled vessel cleanup every {:?}, max age {:?}",
        config.interval, config.max_age
    );

    // First tick completes immediately
    let mut interval = time::interval(config.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        match sweep(store.as_ref(), max_age).await {
            Ok(deleted) => info!("Cleanup complete, deleted {} old vessel records", deleted),
            Err(e) => error!("Error deleting old vessels: {}", e),
        }
    }
}
