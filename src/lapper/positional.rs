//! Positional return-to-origin lap engine.
//!
//! A lap is complete when a baton is seen again at the circuit position its
//! current lap started from. Comparing positions rather than beacons lets
//! several beacons share a line, and tolerates intermediate checkpoints
//! being seen out of physical order.

use std::sync::Arc;

use async_trait::async_trait;

use super::Lapper;
use super::buffers::{BatonArena, BufferedDetection, DetectionBuffer};
use crate::domain::{BatonId, Detection, EntityRegistry, Lap, LapSourceId};
use crate::error::RelayError;

/// Name of this engine in the `lap_source` table.
pub const SOURCE_NAME: &str = "simple-lapper";

/// Lapper emitting a lap whenever a baton returns to its reference position.
///
/// # State machine (per baton)
///
/// `NoHistory → Accumulating → LapEmitted → Accumulating`; there is no
/// terminal state.
#[derive(Debug)]
pub struct PositionalLapper {
    source_name: &'static str,
    source_id: LapSourceId,
    registry: Arc<EntityRegistry>,
    buffers: BatonArena<DetectionBuffer>,
}

impl PositionalLapper {
    /// Creates the engine registered as [`SOURCE_NAME`].
    #[must_use]
    pub fn new(source_id: LapSourceId, registry: Arc<EntityRegistry>) -> Self {
        Self::with_source(SOURCE_NAME, source_id, registry)
    }

    /// Creates the engine under another lap source, for composed lappers.
    #[must_use]
    pub fn with_source(
        source_name: &'static str,
        source_id: LapSourceId,
        registry: Arc<EntityRegistry>,
    ) -> Self {
        Self {
            source_name,
            source_id,
            registry,
            buffers: BatonArena::new(),
        }
    }

    /// Buffered detections of a baton, reference first.
    pub async fn buffer_of(&self, baton_id: BatonId) -> Vec<Detection> {
        match self.buffers.get(baton_id).await {
            Some(slot) => slot.lock().await.detections(),
            None => Vec::new(),
        }
    }
}

#[async_trait]
impl Lapper for PositionalLapper {
    fn source_name(&self) -> &'static str {
        self.source_name
    }

    fn source_id(&self) -> LapSourceId {
        self.source_id
    }

    async fn track(&self, baton_id: BatonId) {
        let _ = self.buffers.get_or_create(baton_id).await;
    }

    async fn handle(&self, detection: &Detection) -> Result<Option<Lap>, RelayError> {
        let position = self
            .registry
            .position_of(detection.beacon_id)
            .await
            .ok_or(RelayError::MissingPosition(detection.beacon_id))?;

        let slot = self.buffers.get_or_create(detection.baton_id).await;
        let mut buffer = slot.lock().await;
        buffer.push(BufferedDetection {
            detection: *detection,
            position,
        });

        let Some(trigger) = buffer.first_return().and_then(|i| buffer.reset_to(i)) else {
            return Ok(None);
        };

        let lap = Lap {
            baton_id: detection.baton_id,
            lap_source_id: self.source_id,
            timestamp: trigger.detection.timestamp,
        };
        tracing::debug!(
            baton_id = %lap.baton_id,
            source = self.source_name,
            position,
            timestamp = %lap.timestamp,
            "lap completed"
        );
        Ok(Some(lap))
    }
}
