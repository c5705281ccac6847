//! HTTP surface: vessel query and health endpoints

mod error;
mod health;
mod vessels;

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::{database::VesselStore, query::VesselQueryService};
pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub vessels: Arc<VesselQueryService>,
    pub store: Arc<dyn VesselStore>,
}

impl AppState {
    pub fn new(vessels: VesselQueryService, store: Arc<dyn VesselStore>) -> Self {
        Self {
            vessels: Arc::new(vessels),
            store,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/vessels", get(vessels::get_vessels))
        .route("/health", get(health::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::geo::GeoPoint;
    use crate::models::{Mmsi, VesselState};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use chrono::Utc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn router_with(store: Arc<MemoryStore>) -> Router {
        let service = VesselQueryService::new(store.clone(), Duration::from_secs(120)).unwrap();
        create_router(AppState::new(service, store))
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn vessels_in_box() {
        let store = Arc::new(MemoryStore::default());
        store
            .upsert_vessel(&VesselState {
                mmsi: Mmsi::try_from(230_123_456u32).unwrap(),
                position: GeoPoint::new(10.0, 10.0).unwrap(),
                course: None,
                name: "TEST".to_string(),
                last_seen: Utc::now(),
            })
            .await
            .unwrap();

        let (status, body) = get_json(
            router_with(store.clone()),
            "/api/vessels?min-lon=5&min-lat=5&max-lon=15&max-lat=15",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            serde_json::json!([{"mmsi": 230123456, "lat": 10.0, "lon": 10.0, "course": null}])
        );

        let (status, body) = get_json(
            router_with(store),
            "/api/vessels?min-lon=20&min-lat=20&max-lon=30&max-lat=30",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!([]));
    }

    #[tokio::test]
    async fn rejects_bad_parameters_before_store_access() {
        let store = Arc::new(MemoryStore::default());

        for uri in [
            "/api/vessels?min-lon=5&min-lat=95&max-lon=15&max-lat=15",
            "/api/vessels?min-lon=5&min-lat=5&max-lon=15",
            "/api/vessels?min-lon=east&min-lat=5&max-lon=15&max-lat=15",
            "/api/vessels",
        ] {
            let (status, body) = get_json(router_with(store.clone()), uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(body["status"], "error");
        }
        assert_eq!(store.reads(), 0);
    }

    #[tokio::test]
    async fn store_failure_is_server_error() {
        let store = Arc::new(MemoryStore::default());
        store.set_unavailable(true);

        let (status, body) = get_json(
            router_with(store),
            "/api/vessels?min-lon=5&min-lat=5&max-lon=15&max-lat=15",
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal Server Error");
    }

    #[tokio::test]
    async fn health_reports_store_state() {
        let store = Arc::new(MemoryStore::default());

        let (status, body) = get_json(router_with(store.clone()), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert!(body["db_time"].is_string());

        store.set_unavailable(true);
        let (status, body) = get_json(router_with(store), "/health").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "error");
    }
}
