//! Vessel store: the store seam and its PostGIS implementation

#[cfg(test)]
pub(crate) mod memory;
mod models;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    PgPool,
};
use tracing::info;

use crate::{
    errors::AisTrackerError,
    geo::{BoundingBox, Envelope},
    models::{VesselPosition, VesselState},
};
use models::VesselRow;

/// How an upsert treats a report older than the stored one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertPolicy {
    /// Overwrite unconditionally
    #[default]
    LastWriteWins,
    /// Skip the update when the incoming `last_seen` is older than the stored one
    MonotonicLastSeen,
}

/// Operations the tracker needs from its spatial store
#[async_trait]
pub trait VesselStore: Send + Sync {
    /// Insert or fully overwrite the row for `vessel.mmsi`
    async fn upsert_vessel(&self, vessel: &VesselState) -> Result<(), AisTrackerError>;

    /// Vessels inside `bbox` with `last_seen >= seen_since`
    async fn vessels_in_bbox(
        &self,
        bbox: &BoundingBox,
        seen_since: DateTime<Utc>,
    ) -> Result<Vec<VesselPosition>, AisTrackerError>;

    /// Delete rows with `last_seen < older_than`, returning the count
    async fn delete_stale(&self, older_than: DateTime<Utc>) -> Result<u64, AisTrackerError>;

    /// Store clock, doubles as the liveness probe
    async fn now(&self) -> Result<DateTime<Utc>, AisTrackerError>;
}

const UPSERT_LAST_WRITE_WINS: &str = "
    INSERT INTO vessels (mmsi, last_seen, geom, course, name)
    VALUES ($1, $2, ST_SetSRID(ST_MakePoint($3, $4), 4326), $5, $6)
    ON CONFLICT (mmsi) DO UPDATE
    SET last_seen = EXCLUDED.last_seen,
        geom = EXCLUDED.geom,
        course = EXCLUDED.course,
        name = EXCLUDED.name";

const UPSERT_MONOTONIC: &str = "
    INSERT INTO vessels (mmsi, last_seen, geom, course, name)
    VALUES ($1, $2, ST_SetSRID(ST_MakePoint($3, $4), 4326), $5, $6)
    ON CONFLICT (mmsi) DO UPDATE
    SET last_seen = EXCLUDED.last_seen,
        geom = EXCLUDED.geom,
        course = EXCLUDED.course,
        name = EXCLUDED.name
    WHERE vessels.last_seen <= EXCLUDED.last_seen";

const SELECT_IN_ENVELOPE: &str = "
    SELECT mmsi, course, ST_Y(geom) AS lat, ST_X(geom) AS lon
    FROM vessels
    WHERE last_seen >= $1
      AND geom && ST_MakeEnvelope($2, $3, $4, $5, 4326)";

const SELECT_IN_SPLIT_ENVELOPE: &str = "
    SELECT mmsi, course, ST_Y(geom) AS lat, ST_X(geom) AS lon
    FROM vessels
    WHERE last_seen >= $1
      AND (geom && ST_MakeEnvelope($2, $3, $4, $5, 4326)
           OR geom && ST_MakeEnvelope($6, $7, $8, $9, 4326))";

/// PostGIS-backed vessel store
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    policy: UpsertPolicy,
}

impl Database {
    /// Wrap an existing pool and run pending migrations
    pub async fn new(pool: PgPool) -> Result<Self, AisTrackerError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self {
            pool,
            policy: UpsertPolicy::default(),
        })
    }

    /// Connect a pool to `url` and run pending migrations
    ///
    /// Every connection carries `statement_timeout`, so no query can hold the
    /// ingestion path indefinitely.
    pub async fn from_url(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
        statement_timeout: Duration,
    ) -> Result<Self, AisTrackerError> {
        info!(
            "Connecting to database: max_connections={}, acquire_timeout={:?}, statement_timeout={:?}",
            max_connections, acquire_timeout, statement_timeout
        );
        let options = url
            .parse::<PgConnectOptions>()?
            .options([("statement_timeout", statement_timeout_setting(statement_timeout))]);
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_with(options)
            .await?;

        Self::new(pool).await
    }

    pub fn with_policy(mut self, policy: UpsertPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn bind_envelope<'q>(
        query: sqlx::query::QueryAs<'q, sqlx::Postgres, VesselRow, sqlx::postgres::PgArguments>,
        envelope: &Envelope,
    ) -> sqlx::query::QueryAs<'q, sqlx::Postgres, VesselRow, sqlx::postgres::PgArguments> {
        query
            .bind(envelope.min_lon)
            .bind(envelope.min_lat)
            .bind(envelope.max_lon)
            .bind(envelope.max_lat)
    }
}

/// Postgres reads a unitless `statement_timeout` as milliseconds
fn statement_timeout_setting(timeout: Duration) -> String {
    timeout.as_millis().to_string()
}

#[async_trait]
impl VesselStore for Database {
    async fn upsert_vessel(&self, vessel: &VesselState) -> Result<(), AisTrackerError> {
        let sql = match self.policy {
            UpsertPolicy::LastWriteWins => UPSERT_LAST_WRITE_WINS,
            UpsertPolicy::MonotonicLastSeen => UPSERT_MONOTONIC,
        };

        sqlx::query(sql)
            .bind(vessel.mmsi.value() as i32)
            .bind(vessel.last_seen)
            .bind(vessel.position.longitude())
            .bind(vessel.position.latitude())
            .bind(vessel.course)
            .bind(vessel.name.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn vessels_in_bbox(
        &self,
        bbox: &BoundingBox,
        seen_since: DateTime<Utc>,
    ) -> Result<Vec<VesselPosition>, AisTrackerError> {
        let envelopes = bbox.envelopes();
        let sql = if envelopes.len() > 1 {
            SELECT_IN_SPLIT_ENVELOPE
        } else {
            SELECT_IN_ENVELOPE
        };

        let mut query = sqlx::query_as::<_, VesselRow>(sql).bind(seen_since);
        for envelope in &envelopes {
            query = Self::bind_envelope(query, envelope);
        }

        let rows: Vec<VesselRow> = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(VesselPosition::try_from).collect()
    }

    async fn delete_stale(&self, older_than: DateTime<Utc>) -> Result<u64, AisTrackerError> {
        let result = sqlx::query("DELETE FROM vessels WHERE last_seen < $1")
            .bind(older_than)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn now(&self) -> Result<DateTime<Utc>, AisTrackerError> {
        let now: DateTime<Utc> = sqlx::query_scalar("SELECT NOW()")
            .fetch_one(&self.pool)
            .await?;
        Ok(now)
    }
}
