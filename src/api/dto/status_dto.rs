//! Response bodies of the system endpoints.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::aggregator::{AggregatorStatus, ConnectionInfo};
use crate::config::ListenerMode;
use crate::domain::RegistrySnapshot;
use crate::lapper::Lapper;
use crate::service::PipelineStats;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Always `"healthy"` while the process serves requests.
    pub status: String,
    /// RFC 3339 server time.
    pub timestamp: String,
    /// Crate version.
    pub version: String,
}

/// Full ingestion status.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    /// Beacon listener state.
    pub listener: ListenerDto,
    /// Open beacon links, oldest first.
    pub links: Vec<LinkDto>,
    /// Registry contents.
    pub registry: RegistryDto,
    /// Enabled lap sources.
    pub lappers: Vec<LapperDto>,
    /// Pipeline counters.
    pub pipeline: PipelineStats,
}

/// Beacon listener state.
#[derive(Debug, Serialize, ToSchema)]
pub struct ListenerDto {
    /// `"offline"` or `"tcp"`.
    pub mode: String,
    /// Bound address, absent when offline.
    pub local_addr: Option<String>,
}

impl ListenerDto {
    /// Builds the DTO from the aggregator status.
    #[must_use]
    pub fn from_status(status: &AggregatorStatus) -> Self {
        let mode = match status.mode {
            ListenerMode::Offline => "offline",
            ListenerMode::Tcp(_) => "tcp",
        };
        Self {
            mode: mode.to_string(),
            local_addr: status.local_addr.map(|addr| addr.to_string()),
        }
    }
}

/// One open beacon link.
#[derive(Debug, Serialize, ToSchema)]
pub struct LinkDto {
    /// Link identifier.
    pub id: String,
    /// Remote address of the beacon device.
    pub peer: String,
    /// Time the link was accepted.
    pub connected_at: DateTime<Utc>,
}

impl From<ConnectionInfo> for LinkDto {
    fn from(info: ConnectionInfo) -> Self {
        Self {
            id: info.id.to_string(),
            peer: info.peer.to_string(),
            connected_at: info.connected_at,
        }
    }
}

/// Registry summary.
#[derive(Debug, Serialize, ToSchema)]
pub struct RegistryDto {
    /// Registered batons.
    pub batons: usize,
    /// Registered beacons.
    pub beacons: usize,
    /// Batons carried by a team, by id.
    pub tracked_batons: Vec<i32>,
}

impl From<&RegistrySnapshot> for RegistryDto {
    fn from(snapshot: &RegistrySnapshot) -> Self {
        Self {
            batons: snapshot.baton_count(),
            beacons: snapshot.beacon_count(),
            tracked_batons: snapshot.tracked_batons().map(|id| id.get()).collect(),
        }
    }
}

/// One enabled lap source.
#[derive(Debug, Serialize, ToSchema)]
pub struct LapperDto {
    /// Lap source name.
    pub source_name: String,
    /// Lap source identifier.
    pub source_id: i32,
}

impl LapperDto {
    /// Describes a running lapper.
    #[must_use]
    pub fn from_lapper(lapper: &dyn Lapper) -> Self {
        Self {
            source_name: lapper.source_name().to_string(),
            source_id: lapper.source_id().get(),
        }
    }
}
