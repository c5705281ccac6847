//! In-memory store double for unit tests
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{UpsertPolicy, VesselStore};
use crate::{
    errors::AisTrackerError,
    geo::BoundingBox,
    models::{Mmsi, VesselPosition, VesselState},
};

#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<Mmsi, VesselState>>,
    writes: AtomicUsize,
    reads: AtomicUsize,
    unavailable: AtomicBool,
    policy: UpsertPolicy,
}

impl MemoryStore {
    pub fn with_policy(policy: UpsertPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn get(&self, mmsi: Mmsi) -> Option<VesselState> {
        self.rows.lock().unwrap().get(&mmsi).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), AisTrackerError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AisTrackerError::DatabaseError(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl VesselStore for MemoryStore {
    async fn upsert_vessel(&self, vessel: &VesselState) -> Result<(), AisTrackerError> {
        self.check_available()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.lock().unwrap();
        let stale = self.policy == UpsertPolicy::MonotonicLastSeen
            && rows
                .get(&vessel.mmsi)
                .is_some_and(|stored| stored.last_seen > vessel.last_seen);
        if !stale {
            rows.insert(vessel.mmsi, vessel.clone());
        }
        Ok(())
    }

    async fn vessels_in_bbox(
        &self,
        bbox: &BoundingBox,
        seen_since: DateTime<Utc>,
    ) -> Result<Vec<VesselPosition>, AisTrackerError> {
        self.check_available()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        let mut vessels: Vec<VesselPosition> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|v| v.last_seen >= seen_since && bbox.contains(&v.position))
            .map(|v| VesselPosition {
                mmsi: v.mmsi,
                lat: v.position.latitude(),
                lon: v.position.longitude(),
                course: v.course,
            })
            .collect();
        vessels.sort_by_key(|v| v.mmsi);
        Ok(vessels)
    }

    async fn delete_stale(&self, older_than: DateTime<Utc>) -> Result<u64, AisTrackerError> {
        self.check_available()?;
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|_, v| v.last_seen >= older_than);
        Ok((before - rows.len()) as u64)
    }

    async fn now(&self) -> Result<DateTime<Utc>, AisTrackerError> {
        self.check_available()?;
        Ok(Utc::now())
    }
}
