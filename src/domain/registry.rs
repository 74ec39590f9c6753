//! Read-mostly lookup of registered batons and beacons.
//!
//! [`EntityRegistry`] keeps an immutable [`RegistrySnapshot`] behind a
//! [`tokio::sync::RwLock`]. Lookups clone the `Arc` and release the lock
//! straight away; a refresh builds a complete new snapshot and swaps it in,
//! so a concurrent lookup sees either the old registrations or the new ones,
//! never a mix.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::model::normalize_address;
use super::{Baton, BatonId, Beacon, BeaconId, Detection, RawDetection, Team};
use crate::error::RelayError;
use crate::persistence::RaceStore;

/// Why a raw detection could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// The baton address is not registered.
    #[error("baton passed with unregistered address: [{0}]")]
    UnknownBaton(String),
    /// The beacon address is not registered.
    #[error("beacon passed with unregistered address: [{0}]")]
    UnknownBeacon(String),
    /// Neither address is registered.
    #[error("unregistered baton [{baton}] and beacon [{beacon}]")]
    Unregistered {
        /// Unknown baton address.
        baton: String,
        /// Unknown beacon address.
        beacon: String,
    },
}

impl ResolveError {
    /// Splits the failure into one [`RelayError`] per missing side.
    #[must_use]
    pub fn into_relay_errors(self) -> Vec<RelayError> {
        match self {
            Self::UnknownBaton(addr) => vec![RelayError::UnknownBaton(addr)],
            Self::UnknownBeacon(addr) => vec![RelayError::UnknownBeacon(addr)],
            Self::Unregistered { baton, beacon } => vec![
                RelayError::UnknownBaton(baton),
                RelayError::UnknownBeacon(beacon),
            ],
        }
    }
}

/// A raw detection whose addresses both resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Registered baton.
    pub baton: Baton,
    /// Registered beacon.
    pub beacon: Beacon,
}

impl Resolved {
    /// Builds the [`Detection`] record for this pair at `timestamp`.
    #[must_use]
    pub fn into_detection(&self, timestamp: DateTime<Utc>) -> Detection {
        Detection::new(self.baton.id, self.beacon.id, timestamp)
    }
}

/// Immutable view of all registrations at one point in time.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    batons: HashMap<String, Baton>,
    beacons: HashMap<String, Beacon>,
    positions: HashMap<BeaconId, i64>,
    tracked: BTreeSet<BatonId>,
}

impl RegistrySnapshot {
    /// Builds a snapshot from registered entities.
    ///
    /// The position map is derived from the beacons; batons carried by a
    /// team are recorded as tracked.
    #[must_use]
    pub fn new(batons: Vec<Baton>, beacons: Vec<Beacon>, teams: &[Team]) -> Self {
        let positions = beacons.iter().map(|b| (b.id, b.position)).collect();
        let batons = batons
            .into_iter()
            .map(|b| (normalize_address(&b.address), b))
            .collect();
        let beacons = beacons
            .into_iter()
            .map(|b| (normalize_address(&b.address), b))
            .collect();
        let tracked = teams.iter().filter_map(|t| t.baton_id).collect();
        Self {
            batons,
            beacons,
            positions,
            tracked,
        }
    }

    /// Looks up a baton by hardware address.
    #[must_use]
    pub fn find_baton_by_address(&self, address: &str) -> Option<&Baton> {
        self.batons.get(&normalize_address(address))
    }

    /// Looks up a beacon by hardware address.
    #[must_use]
    pub fn find_beacon_by_address(&self, address: &str) -> Option<&Beacon> {
        self.beacons.get(&normalize_address(address))
    }

    /// Returns the circuit position of a beacon.
    #[must_use]
    pub fn position_of(&self, beacon_id: BeaconId) -> Option<i64> {
        self.positions.get(&beacon_id).copied()
    }

    /// Resolves both addresses of a raw detection.
    ///
    /// # Errors
    ///
    /// Returns a [`ResolveError`] naming every address that is not
    /// registered.
    pub fn resolve(&self, raw: &RawDetection) -> Result<Resolved, ResolveError> {
        let baton = self.find_baton_by_address(&raw.baton_address);
        let beacon = self.find_beacon_by_address(&raw.beacon_address);
        match (baton, beacon) {
            (Some(baton), Some(beacon)) => Ok(Resolved {
                baton: baton.clone(),
                beacon: beacon.clone(),
            }),
            (None, Some(_)) => Err(ResolveError::UnknownBaton(raw.baton_address.clone())),
            (Some(_), None) => Err(ResolveError::UnknownBeacon(raw.beacon_address.clone())),
            (None, None) => Err(ResolveError::Unregistered {
                baton: raw.baton_address.clone(),
                beacon: raw.beacon_address.clone(),
            }),
        }
    }

    /// Batons carried by a team.
    pub fn tracked_batons(&self) -> impl Iterator<Item = BatonId> + '_ {
        self.tracked.iter().copied()
    }

    /// Number of registered batons.
    #[must_use]
    pub fn baton_count(&self) -> usize {
        self.batons.len()
    }

    /// Number of registered beacons.
    #[must_use]
    pub fn beacon_count(&self) -> usize {
        self.beacons.len()
    }
}

/// Shared registry handle, built once at startup and passed by `Arc`.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    snapshot: RwLock<Arc<RegistrySnapshot>>,
}

impl EntityRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry serving the given snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: RegistrySnapshot) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Returns the current snapshot.
    pub async fn snapshot(&self) -> Arc<RegistrySnapshot> {
        Arc::clone(&*self.snapshot.read().await)
    }

    /// Atomically replaces the current snapshot.
    pub async fn replace(&self, snapshot: RegistrySnapshot) {
        *self.snapshot.write().await = Arc::new(snapshot);
    }

    /// Reloads all registrations from the store.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::PersistenceError`] if any load fails; the
    /// previous snapshot stays in place.
    pub async fn refresh(&self, store: &dyn RaceStore) -> Result<(), RelayError> {
        let batons = store.batons().await?;
        let beacons = store.beacons().await?;
        let teams = store.teams().await?;
        let snapshot = RegistrySnapshot::new(batons, beacons, &teams);
        tracing::debug!(
            batons = snapshot.baton_count(),
            beacons = snapshot.beacon_count(),
            "registry refreshed"
        );
        self.replace(snapshot).await;
        Ok(())
    }

    /// Resolves a raw detection against the current snapshot.
    ///
    /// # Errors
    ///
    /// See [`RegistrySnapshot::resolve`].
    pub async fn resolve(&self, raw: &RawDetection) -> Result<Resolved, ResolveError> {
        self.snapshot().await.resolve(raw)
    }

    /// Returns the circuit position of a beacon in the current snapshot.
    pub async fn position_of(&self, beacon_id: BeaconId) -> Option<i64> {
        self.snapshot().await.position_of(beacon_id)
    }
}
