//! Domain layer: identifiers, race entities, the event system and the
//! entity registry.
//!
//! This module contains the server-side domain model: registered batons and
//! beacons, the detection and lap records derived from beacon traffic, the
//! event bus that broadcasts ingestion progress, and the registry that
//! resolves hardware addresses to registered entities.

pub mod event_bus;
pub mod ids;
pub mod model;
pub mod race_event;
pub mod registry;

pub use event_bus::EventBus;
pub use ids::{BatonId, BeaconId, ConnectionId, LapSourceId, TeamId};
pub use model::{Baton, Beacon, Detection, Lap, RawDetection, Team};
pub use race_event::RaceEvent;
pub use registry::{EntityRegistry, RegistrySnapshot, ResolveError, Resolved};
