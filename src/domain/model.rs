//! Race entities and the records that flow through the ingestion path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BatonId, BeaconId, LapSourceId, TeamId};

/// Wearable transponder carried by a competitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Baton {
    /// Database identifier.
    pub id: BatonId,
    /// Human-readable label.
    pub name: String,
    /// Hardware address, normalised with [`normalize_address`].
    pub address: String,
}

/// Fixed checkpoint hardware positioned along the circuit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beacon {
    /// Database identifier.
    pub id: BeaconId,
    /// Human-readable label.
    pub name: String,
    /// Hardware address, normalised with [`normalize_address`].
    pub address: String,
    /// Ordering of this checkpoint along the circuit. Several beacons may
    /// share a position (e.g. a doubled start/finish line).
    pub position: i64,
}

/// A competing team and the baton it currently carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Database identifier.
    pub id: TeamId,
    /// Team name.
    pub name: String,
    /// Baton currently assigned to the team, if any.
    pub baton_id: Option<BatonId>,
}

/// A baton sensed by a beacon at a point in time.
///
/// Only constructed once both hardware addresses resolved to registered
/// entities. Immutable and append-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    /// Baton that was sensed.
    pub baton_id: BatonId,
    /// Beacon that sensed it.
    pub beacon_id: BeaconId,
    /// Time reported by the beacon hardware.
    pub timestamp: DateTime<Utc>,
}

impl Detection {
    /// Creates a detection record.
    #[must_use]
    pub const fn new(baton_id: BatonId, beacon_id: BeaconId, timestamp: DateTime<Utc>) -> Self {
        Self {
            baton_id,
            beacon_id,
            timestamp,
        }
    }
}

/// A completed lap, produced exclusively by a lapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lap {
    /// Baton that completed the lap.
    pub baton_id: BatonId,
    /// Algorithm that decided the lap boundary.
    pub lap_source_id: LapSourceId,
    /// Timestamp of the detection that closed the lap.
    pub timestamp: DateTime<Utc>,
}

/// Detection as reported by a beacon link, before registry resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawDetection {
    /// Hardware address of the baton.
    pub baton_address: String,
    /// Hardware address of the reporting beacon.
    pub beacon_address: String,
    /// Time reported by the beacon.
    pub time: DateTime<Utc>,
}

/// Canonical form of a hardware address: trimmed and upper-cased.
///
/// Firmware revisions disagree on the case of MAC strings, so every
/// address is normalised before it is stored or looked up.
#[must_use]
pub fn normalize_address(address: &str) -> String {
    address.trim().to_ascii_uppercase()
}
