//! Connection aggregator: holds one link per beacon device and turns its
//! newline-delimited messages into [`crate::domain::RawDetection`]s.
//!
//! Every accepted link runs in its own task, so a slow handler or a noisy
//! device only affects its own link. Link activity is reported through the
//! [`AggregatorHandler`] registered at construction.

pub mod connection;
pub mod handler;
pub mod listener;
pub mod wire;

pub use handler::{AggregatorHandler, ConnectionInfo};
pub use listener::{AggregatorHandle, AggregatorStatus, BeaconAggregator, LinkTable};
