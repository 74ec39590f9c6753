//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::aggregator::AggregatorStatus;
use crate::domain::{EntityRegistry, EventBus};
use crate::service::DetectionPipeline;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Address-to-entity registry.
    pub registry: Arc<EntityRegistry>,
    /// Ingestion pipeline, for counters and lapper metadata.
    pub pipeline: Arc<DetectionPipeline>,
    /// Beacon listener status.
    pub aggregator: AggregatorStatus,
    /// Event bus for WebSocket subscriptions.
    pub event_bus: EventBus,
}
