//! Lap determination: the [`Lapper`] capability and its engines.
//!
//! A lapper consumes resolved detections in arrival order and decides, per
//! baton, when a lap boundary has been crossed. Engines are selected at
//! startup from configuration ([`build_lappers`]) and several may run side
//! by side; each tags its laps with its own lap source.

pub mod buffers;
pub mod positional;
pub mod speed_filter;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{LapperKind, RelayConfig};
use crate::domain::{BatonId, Detection, EntityRegistry, Lap, LapSourceId};
use crate::error::RelayError;
use crate::persistence::RaceStore;

pub use positional::PositionalLapper;
pub use speed_filter::{FilteredLapper, SpeedFilter};

/// A lap-determination algorithm.
///
/// Implementations keep their own per-baton state and must serialize
/// updates for the same baton. They never write to storage: the caller
/// records every returned [`Lap`].
#[async_trait]
pub trait Lapper: Send + Sync + std::fmt::Debug {
    /// Symbolic name of this engine's lap source.
    fn source_name(&self) -> &'static str;

    /// Identifier stamped on every emitted lap.
    fn source_id(&self) -> LapSourceId;

    /// Prepares state for a baton ahead of its first detection.
    async fn track(&self, _baton_id: BatonId) {}

    /// Feeds one detection and returns the lap it completes, if any.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::MissingPosition`] if the detection's beacon has
    /// no circuit position; the detection is then ignored by this engine.
    async fn handle(&self, detection: &Detection) -> Result<Option<Lap>, RelayError>;
}

/// Builds every lapper named in the configuration, resolving each lap
/// source through the store and pre-tracking the batons teams carry.
///
/// # Errors
///
/// Returns a [`RelayError`] if a lap source cannot be resolved.
pub async fn build_lappers(
    config: &RelayConfig,
    registry: &Arc<EntityRegistry>,
    store: &dyn RaceStore,
) -> Result<Vec<Arc<dyn Lapper>>, RelayError> {
    let mut lappers: Vec<Arc<dyn Lapper>> = Vec::with_capacity(config.lappers.len());

    for kind in &config.lappers {
        let lapper: Arc<dyn Lapper> = match kind {
            LapperKind::Simple => {
                let source_id = store.lap_source_id(positional::SOURCE_NAME).await?;
                Arc::new(PositionalLapper::new(source_id, Arc::clone(registry)))
            }
            LapperKind::SpeedFiltered => {
                let source_id = store.lap_source_id(speed_filter::SOURCE_NAME).await?;
                let inner = PositionalLapper::with_source(
                    speed_filter::SOURCE_NAME,
                    source_id,
                    Arc::clone(registry),
                );
                let filter = SpeedFilter::new(config.max_speed_kmh, config.circuit_length);
                Arc::new(FilteredLapper::new(filter, Arc::clone(registry), inner))
            }
        };
        tracing::info!(
            source = lapper.source_name(),
            source_id = %lapper.source_id(),
            "lapper enabled"
        );
        lappers.push(lapper);
    }

    let tracked: Vec<BatonId> = registry.snapshot().await.tracked_batons().collect();
    for lapper in &lappers {
        for baton_id in &tracked {
            lapper.track(*baton_id).await;
        }
    }

    Ok(lappers)
}
