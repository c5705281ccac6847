use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::Deserialize;

use super::{ApiError, AppState};
use crate::models::VesselPosition;

/// Bounding box query string, all four bounds required
#[derive(Debug, Deserialize)]
pub struct VesselQueryParams {
    #[serde(rename = "min-lon")]
    pub min_lon: f64,
    #[serde(rename = "min-lat")]
    pub min_lat: f64,
    #[serde(rename = "max-lon")]
    pub max_lon: f64,
    #[serde(rename = "max-lat")]
    pub max_lat: f64,
}

pub async fn get_vessels(
    State(state): State<AppState>,
    params: Result<Query<VesselQueryParams>, QueryRejection>,
) -> Result<Json<Vec<VesselPosition>>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let vessels = state
        .vessels
        .query(
            params.min_lon,
            params.min_lat,
            params.max_lon,
            params.max_lat,
        )
        .await?;

    Ok(Json(vessels))
}
