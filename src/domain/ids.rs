//! Type-safe identifiers for race entities.
//!
//! Registered entities are keyed by the integer primary keys the
//! persistence layer assigns, wrapped in newtypes so a baton id can never
//! be passed where a beacon id is expected. Beacon links are identified by
//! [`ConnectionId`], a UUID v4 generated when the link is accepted.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! integer_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            /// Wraps a raw database key.
            #[must_use]
            pub const fn new(raw: i32) -> Self {
                Self(raw)
            }

            /// Returns the raw database key.
            #[must_use]
            pub const fn get(self) -> i32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i32> for $name {
            fn from(raw: i32) -> Self {
                Self(raw)
            }
        }
    };
}

integer_id!(
    /// Identifier of a registered baton.
    BatonId
);
integer_id!(
    /// Identifier of a registered beacon.
    BeaconId
);
integer_id!(
    /// Identifier of a team.
    TeamId
);
integer_id!(
    /// Identifier of a lap-determination algorithm, as stored in the
    /// `lap_source` table.
    LapSourceId
);

/// Unique identifier for one accepted beacon link.
///
/// Generated when the aggregator accepts a TCP connection and immutable for
/// the lifetime of that link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    /// Creates a new random `ConnectionId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
