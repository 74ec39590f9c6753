//! Service layer: ingestion orchestration.
//!
//! [`DetectionPipeline`] sits behind the beacon aggregator, resolves each
//! detection through the [`super::domain::EntityRegistry`], records it,
//! drives the lappers and emits events through the
//! [`super::domain::EventBus`].

pub mod detection_pipeline;
pub mod retry;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::domain::EntityRegistry;
use crate::persistence::RaceStore;

pub use detection_pipeline::{DetectionPipeline, PipelineStats};
pub use retry::RetryPolicy;

/// Spawns a task reloading the registry from `store` every `interval`.
///
/// A failed reload keeps the previous snapshot. An `interval` of zero
/// disables refreshing and the returned task completes immediately.
pub fn spawn_registry_refresh(
    registry: Arc<EntityRegistry>,
    store: Arc<dyn RaceStore>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if interval.is_zero() {
            tracing::info!("registry refresh disabled");
            return;
        }
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; startup already loaded the registry.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(err) = registry.refresh(store.as_ref()).await {
                tracing::warn!(error = %err, "registry refresh failed, keeping previous snapshot");
            }
        }
    })
}
