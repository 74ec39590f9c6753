//! Response bodies of the registry lookup endpoints.

use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{Baton, Beacon};

/// A registered baton.
#[derive(Debug, Serialize, ToSchema)]
pub struct BatonDto {
    /// Baton identifier.
    pub id: i32,
    /// Display name.
    pub name: String,
    /// Normalised hardware address.
    pub address: String,
    /// Whether a team currently carries this baton.
    pub tracked: bool,
}

impl BatonDto {
    /// Describes `baton`; `tracked` comes from the registry snapshot.
    #[must_use]
    pub fn new(baton: &Baton, tracked: bool) -> Self {
        Self {
            id: baton.id.get(),
            name: baton.name.clone(),
            address: baton.address.clone(),
            tracked,
        }
    }
}

/// A registered beacon and its circuit position.
#[derive(Debug, Serialize, ToSchema)]
pub struct BeaconDto {
    /// Beacon identifier.
    pub id: i32,
    /// Display name.
    pub name: String,
    /// Normalised hardware address.
    pub address: String,
    /// Position along the circuit.
    pub position: i64,
}

impl From<&Beacon> for BeaconDto {
    fn from(beacon: &Beacon) -> Self {
        Self {
            id: beacon.id.get(),
            name: beacon.name.clone(),
            address: beacon.address.clone(),
            position: beacon.position,
        }
    }
}
