//! In-process store used when persistence is disabled and in tests.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::RaceStore;
use crate::domain::model::normalize_address;
use crate::domain::{Baton, BatonId, Beacon, BeaconId, Detection, Lap, LapSourceId, Team, TeamId};
use crate::error::RelayError;

#[derive(Debug, Default)]
struct MemoryState {
    batons: Vec<Baton>,
    beacons: Vec<Beacon>,
    teams: Vec<Team>,
    detections: Vec<Detection>,
    laps: Vec<Lap>,
    lap_sources: Vec<String>,
}

/// [`RaceStore`] keeping everything in memory.
///
/// Identifiers are assigned sequentially starting at 1, like database
/// serial keys. Inserts can be made to fail on demand with
/// [`MemoryStore::fail_next_inserts`] or, for laps only,
/// [`MemoryStore::fail_next_lap_inserts`] to exercise the retry policy.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    failing_inserts: AtomicU32,
    failing_lap_inserts: AtomicU32,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a baton and returns it.
    pub async fn register_baton(&self, address: &str) -> Baton {
        let mut state = self.state.write().await;
        let id = BatonId::new(next_id(state.batons.len()));
        let baton = Baton {
            id,
            name: format!("baton {id}"),
            address: normalize_address(address),
        };
        state.batons.push(baton.clone());
        baton
    }

    /// Registers a beacon at the given circuit position and returns it.
    pub async fn register_beacon(&self, address: &str, position: i64) -> Beacon {
        let mut state = self.state.write().await;
        let id = BeaconId::new(next_id(state.beacons.len()));
        let beacon = Beacon {
            id,
            name: format!("beacon {id}"),
            address: normalize_address(address),
            position,
        };
        state.beacons.push(beacon.clone());
        beacon
    }

    /// Registers a team carrying `baton_id` and returns it.
    pub async fn register_team(&self, name: &str, baton_id: Option<BatonId>) -> Team {
        let mut state = self.state.write().await;
        let team = Team {
            id: TeamId::new(next_id(state.teams.len())),
            name: name.to_string(),
            baton_id,
        };
        state.teams.push(team.clone());
        team
    }

    /// Makes the next `count` detection or lap inserts fail.
    pub fn fail_next_inserts(&self, count: u32) {
        self.failing_inserts.store(count, Ordering::SeqCst);
    }

    /// Makes the next `count` lap inserts fail, leaving detections alone.
    pub fn fail_next_lap_inserts(&self, count: u32) {
        self.failing_lap_inserts.store(count, Ordering::SeqCst);
    }

    /// Returns every recorded detection in insertion order.
    pub async fn detections(&self) -> Vec<Detection> {
        self.state.read().await.detections.clone()
    }

    /// Returns every recorded lap in insertion order.
    pub async fn laps(&self) -> Vec<Lap> {
        self.state.read().await.laps.clone()
    }
}

fn take_injected_failure(counter: &AtomicU32) -> Result<(), RelayError> {
    let injected = counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if injected {
        return Err(RelayError::PersistenceError(
            "injected insert failure".to_string(),
        ));
    }
    Ok(())
}

fn next_id(len: usize) -> i32 {
    i32::try_from(len).map_or(i32::MAX, |n| n.saturating_add(1))
}

#[async_trait]
impl RaceStore for MemoryStore {
    async fn insert_detection(&self, detection: &Detection) -> Result<(), RelayError> {
        take_injected_failure(&self.failing_inserts)?;
        self.state.write().await.detections.push(*detection);
        Ok(())
    }

    async fn insert_lap(&self, lap: &Lap) -> Result<(), RelayError> {
        take_injected_failure(&self.failing_lap_inserts)?;
        take_injected_failure(&self.failing_inserts)?;
        self.state.write().await.laps.push(*lap);
        Ok(())
    }

    async fn lap_source_id(&self, name: &str) -> Result<LapSourceId, RelayError> {
        let mut state = self.state.write().await;
        let index = match state.lap_sources.iter().position(|s| s == name) {
            Some(index) => index,
            None => {
                state.lap_sources.push(name.to_string());
                state.lap_sources.len().saturating_sub(1)
            }
        };
        Ok(LapSourceId::new(next_id(index)))
    }

    async fn batons(&self) -> Result<Vec<Baton>, RelayError> {
        Ok(self.state.read().await.batons.clone())
    }

    async fn beacons(&self) -> Result<Vec<Beacon>, RelayError> {
        Ok(self.state.read().await.beacons.clone())
    }

    async fn teams(&self) -> Result<Vec<Team>, RelayError> {
        Ok(self.state.read().await.teams.clone())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn registrations_get_sequential_ids() {
        let store = MemoryStore::new();
        let a = store.register_baton("aa").await;
        let b = store.register_baton("bb").await;
        assert_eq!(a.id, BatonId::new(1));
        assert_eq!(b.id, BatonId::new(2));
        assert_eq!(a.address, "AA");
    }

    #[tokio::test]
    async fn lap_source_ids_are_stable() {
        let store = MemoryStore::new();
        let Ok(first) = store.lap_source_id("simple-lapper").await else {
            panic!("lookup failed");
        };
        let Ok(other) = store.lap_source_id("speed-filtered-lapper").await else {
            panic!("lookup failed");
        };
        let Ok(again) = store.lap_source_id("simple-lapper").await else {
            panic!("lookup failed");
        };
        assert_eq!(first, again);
        assert_ne!(first, other);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let store = MemoryStore::new();
        let det = Detection::new(BatonId::new(1), BeaconId::new(1), Utc::now());
        store.fail_next_inserts(1);

        assert!(store.insert_detection(&det).await.is_err());
        assert!(store.insert_detection(&det).await.is_ok());
        assert_eq!(store.detections().await.len(), 1);
    }

    #[tokio::test]
    async fn lap_failures_leave_detections_alone() {
        let store = MemoryStore::new();
        let det = Detection::new(BatonId::new(1), BeaconId::new(1), Utc::now());
        let lap = Lap {
            baton_id: BatonId::new(1),
            lap_source_id: LapSourceId::new(1),
            timestamp: Utc::now(),
        };
        store.fail_next_lap_inserts(1);

        assert!(store.insert_detection(&det).await.is_ok());
        assert!(store.insert_lap(&lap).await.is_err());
        assert!(store.insert_lap(&lap).await.is_ok());
        assert_eq!(store.laps().await.len(), 1);
    }
}
