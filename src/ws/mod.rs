//! WebSocket layer: live event feed.
//!
//! The endpoint at `/ws` streams [`crate::domain::RaceEvent`]s to clients
//! that subscribed to a baton id, or to `"*"` for everything including
//! beacon link events.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
