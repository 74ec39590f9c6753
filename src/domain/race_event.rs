//! Domain events reflecting ingestion progress.
//!
//! Beacon link lifecycle changes, recorded detections and emitted laps are
//! published as [`RaceEvent`]s through the [`super::EventBus`] and forwarded
//! to live-feed WebSocket subscribers.

use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{BatonId, BeaconId, ConnectionId, LapSourceId};

/// Domain event emitted by the aggregator and the detection pipeline.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum RaceEvent {
    /// A beacon device opened a link.
    BeaconConnected {
        /// Link identifier.
        connection_id: ConnectionId,
        /// Remote socket address of the device.
        peer: SocketAddr,
        /// Time the link was accepted.
        timestamp: DateTime<Utc>,
    },

    /// A beacon link closed.
    BeaconDisconnected {
        /// Link identifier.
        connection_id: ConnectionId,
        /// Remote socket address of the device.
        peer: SocketAddr,
        /// Time the link closed.
        timestamp: DateTime<Utc>,
    },

    /// A resolved detection was handed to the persistence sink.
    DetectionRecorded {
        /// Baton that was sensed.
        baton_id: BatonId,
        /// Beacon that sensed it.
        beacon_id: BeaconId,
        /// Time reported by the beacon.
        timestamp: DateTime<Utc>,
    },

    /// A lapper decided that a baton completed a lap.
    LapCompleted {
        /// Baton that completed the lap.
        baton_id: BatonId,
        /// Identifier of the producing lapper.
        lap_source_id: LapSourceId,
        /// Symbolic name of the producing lapper.
        source_name: String,
        /// Timestamp of the detection that closed the lap.
        timestamp: DateTime<Utc>,
    },
}

impl RaceEvent {
    /// Returns the baton this event concerns, if any.
    ///
    /// Link lifecycle events are not tied to a baton.
    #[must_use]
    pub const fn baton_id(&self) -> Option<BatonId> {
        match self {
            Self::DetectionRecorded { baton_id, .. } | Self::LapCompleted { baton_id, .. } => {
                Some(*baton_id)
            }
            Self::BeaconConnected { .. } | Self::BeaconDisconnected { .. } => None,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::BeaconConnected { .. } => "beacon_connected",
            Self::BeaconDisconnected { .. } => "beacon_disconnected",
            Self::DetectionRecorded { .. } => "detection_recorded",
            Self::LapCompleted { .. } => "lap_completed",
        }
    }
}
