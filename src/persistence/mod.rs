//! Persistence layer: detection and lap sink plus registry source.
//!
//! Provides the [`RaceStore`] trait through which the ingestion path records
//! every accepted detection and every emitted lap, and from which the
//! [`crate::domain::EntityRegistry`] loads registrations. The concrete
//! implementations are [`PostgresStore`] (async PostgreSQL via `sqlx`) and
//! [`MemoryStore`] (offline mode and tests).

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::domain::{Baton, Beacon, Detection, Lap, LapSourceId, Team};
use crate::error::RelayError;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Durable storage consumed by the ingestion core.
#[async_trait]
pub trait RaceStore: Send + Sync + std::fmt::Debug {
    /// Records an accepted detection.
    async fn insert_detection(&self, detection: &Detection) -> Result<(), RelayError>;

    /// Records an emitted lap.
    async fn insert_lap(&self, lap: &Lap) -> Result<(), RelayError>;

    /// Resolves a lapper's symbolic name to its stable identifier,
    /// registering the name if it is not known yet.
    async fn lap_source_id(&self, name: &str) -> Result<LapSourceId, RelayError>;

    /// Loads all registered batons.
    async fn batons(&self) -> Result<Vec<Baton>, RelayError>;

    /// Loads all registered beacons with their circuit positions.
    async fn beacons(&self) -> Result<Vec<Beacon>, RelayError>;

    /// Loads all teams.
    async fn teams(&self) -> Result<Vec<Team>, RelayError>;
}
