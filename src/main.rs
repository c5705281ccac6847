//! AIS tracker service

use std::future::IntoFuture;
use std::sync::Arc;

use ais_tracker::{
    api::{create_router, AppState},
    config::AppConfig,
    database::{Database, VesselStore},
    errors::AisTrackerError,
    maintenance::run_maintenance,
    pipeline::IngestionPipeline,
    query::VesselQueryService,
    stream::{Supervisor, WsConnector},
};
use tokio::{net::TcpListener, signal};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), AisTrackerError> {
    #[cfg(feature = "dotenvy")]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Missing credentials must stop us before any connection attempt
    let config = AppConfig::load()?;
    config.validate()?;

    let database = Database::from_url(
        &config.database.url,
        config.database.max_connections,
        config.database.acquire_timeout,
        config.database.statement_timeout,
    )
    .await?
    .with_policy(config.database.upsert_policy);
    let store: Arc<dyn VesselStore> = Arc::new(database);

    let pipeline = Arc::new(IngestionPipeline::new(store.clone()));
    let supervisor = Supervisor::new(
        WsConnector::new(config.stream.url.clone()),
        pipeline,
        config.stream.clone(),
    );

    let query_service = VesselQueryService::new(store.clone(), config.server.freshness_window)?;
    let app = create_router(AppState::new(query_service, store.clone()));
    let listener = TcpListener::bind(config.server.bind_address).await?;
    info!("Listening on {}", config.server.bind_address);

    tokio::select! {
        _ = supervisor.run() => {
            error!("Feed supervisor stopped unexpectedly");
        }
        result = run_maintenance(store, config.maintenance.clone()) => {
            error!("Maintenance stopped: {:?}", result);
        }
        result = axum::serve(listener, app).into_future() => {
            info!("HTTP server completed: {:?}", result);
        }
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    Ok(())
}
