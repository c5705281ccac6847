use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::error;

use super::{ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub db_time: DateTime<Utc>,
}

/// Healthy while the store is connectable and queryable
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    match state.store.now().await {
        Ok(db_time) => Ok(Json(HealthResponse {
            status: "ok",
            db_time,
        })),
        Err(e) => {
            error!("Health check failed: {}", e);
            Err(ApiError::ServiceUnavailable(
                "Database connection failed".to_string(),
            ))
        }
    }
}
