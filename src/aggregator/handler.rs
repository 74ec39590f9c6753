//! Observer interface for beacon link activity.

use std::net::SocketAddr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{ConnectionId, RawDetection};
use crate::error::RelayError;

/// Metadata of one accepted beacon link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionInfo {
    /// Link identifier.
    pub id: ConnectionId,
    /// Remote socket address of the beacon device.
    pub peer: SocketAddr,
    /// Time the link was accepted.
    pub connected_at: DateTime<Utc>,
}

impl ConnectionInfo {
    /// Describes a link accepted just now from `peer`.
    #[must_use]
    pub fn new(peer: SocketAddr) -> Self {
        Self {
            id: ConnectionId::new(),
            peer,
            connected_at: Utc::now(),
        }
    }
}

/// Receives connect, disconnect, data and error events from the
/// [`super::BeaconAggregator`].
///
/// The handler is registered once when the aggregator is built and is
/// invoked from the task owning each link, so calls for one link are
/// sequential and in wire order while different links proceed
/// independently. All methods default to doing nothing.
#[async_trait]
pub trait AggregatorHandler: Send + Sync + std::fmt::Debug {
    /// A beacon device established a link.
    async fn on_connect(&self, _info: &ConnectionInfo) {}

    /// A link closed, either by the device or during shutdown.
    async fn on_disconnect(&self, _info: &ConnectionInfo) {}

    /// A well-formed detection arrived on a link.
    async fn on_data(&self, _info: &ConnectionInfo, _detection: RawDetection) {}

    /// A malformed line or transport fault occurred on a link.
    async fn on_error(&self, _info: &ConnectionInfo, _error: RelayError) {}
}
