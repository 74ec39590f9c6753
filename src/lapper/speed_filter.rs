//! Maximum-speed filter stage and the lapper composed with it.
//!
//! [`SpeedFilter`] decides, from the last detection it admitted for a baton,
//! whether a new detection implies an impossible speed. Position units are
//! taken as metres. When the circuit length is known, distance is measured
//! forward around the circuit, so returning to the same position means one
//! full circuit; otherwise the straight difference is used and a repeat at
//! the same position cannot be judged and is admitted.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::Lapper;
use super::buffers::BatonArena;
use crate::domain::{BatonId, Detection, EntityRegistry, Lap, LapSourceId};
use crate::error::RelayError;

/// Name of the speed-filtered engine in the `lap_source` table.
pub const SOURCE_NAME: &str = "speed-filtered-lapper";

/// A detection the filter let through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admitted {
    /// Detection time.
    pub timestamp: DateTime<Utc>,
    /// Circuit position of the detecting beacon.
    pub position: i64,
}

/// Outcome of [`SpeedFilter::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    /// Plausible; pass the detection on.
    Admit,
    /// Implies a speed above the limit.
    Reject {
        /// Implied speed in km/h (infinite for zero elapsed time).
        speed_kmh: f64,
    },
}

/// Rejects detections implying a speed above a fixed limit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedFilter {
    max_speed_kmh: f64,
    circuit_length: Option<i64>,
}

impl SpeedFilter {
    /// Creates a filter with the given limit and optional circuit length.
    #[must_use]
    pub fn new(max_speed_kmh: f64, circuit_length: Option<i64>) -> Self {
        Self {
            max_speed_kmh,
            circuit_length: circuit_length.filter(|len| *len > 0),
        }
    }

    /// Distance from `from` to `to`, or `None` when it cannot be judged.
    #[must_use]
    pub fn distance(&self, from: i64, to: i64) -> Option<i64> {
        let delta = to.checked_sub(from)?;
        match self.circuit_length {
            Some(len) => match delta.rem_euclid(len) {
                0 => Some(len),
                forward => Some(forward),
            },
            None if delta == 0 => None,
            None => delta.checked_abs(),
        }
    }

    /// Judges `candidate` against the last admitted detection of the same
    /// baton. Detections older than `last` are admitted.
    #[must_use]
    pub fn evaluate(&self, last: Option<&Admitted>, candidate: &Admitted) -> Verdict {
        let Some(last) = last else {
            return Verdict::Admit;
        };
        let elapsed_ms = (candidate.timestamp - last.timestamp).num_milliseconds();
        if elapsed_ms < 0 {
            return Verdict::Admit;
        }
        let Some(distance) = self.distance(last.position, candidate.position) else {
            return Verdict::Admit;
        };

        #[allow(clippy::cast_precision_loss)]
        let speed_kmh = if elapsed_ms == 0 {
            f64::INFINITY
        } else {
            distance as f64 / (elapsed_ms as f64 / 1000.0) * 3.6
        };
        if speed_kmh > self.max_speed_kmh {
            Verdict::Reject { speed_kmh }
        } else {
            Verdict::Admit
        }
    }
}

/// A lapper fed only with detections that pass a [`SpeedFilter`].
///
/// Filtering and the inner engine run inside one per-baton critical
/// section, so the filter's notion of "last admitted" always matches what
/// the inner engine has seen.
#[derive(Debug)]
pub struct FilteredLapper<L> {
    filter: SpeedFilter,
    registry: Arc<EntityRegistry>,
    admitted: BatonArena<Option<Admitted>>,
    inner: L,
}

impl<L: Lapper> FilteredLapper<L> {
    /// Puts `filter` in front of `inner`. Laps are tagged with the inner
    /// engine's source.
    #[must_use]
    pub fn new(filter: SpeedFilter, registry: Arc<EntityRegistry>, inner: L) -> Self {
        Self {
            filter,
            registry,
            admitted: BatonArena::new(),
            inner,
        }
    }

    /// The wrapped engine.
    #[must_use]
    pub fn inner(&self) -> &L {
        &self.inner
    }
}

#[async_trait]
impl<L: Lapper> Lapper for FilteredLapper<L> {
    fn source_name(&self) -> &'static str {
        self.inner.source_name()
    }

    fn source_id(&self) -> LapSourceId {
        self.inner.source_id()
    }

    async fn track(&self, baton_id: BatonId) {
        let _ = self.admitted.get_or_create(baton_id).await;
        self.inner.track(baton_id).await;
    }

    async fn handle(&self, detection: &Detection) -> Result<Option<Lap>, RelayError> {
        let position = self
            .registry
            .position_of(detection.beacon_id)
            .await
            .ok_or(RelayError::MissingPosition(detection.beacon_id))?;
        let candidate = Admitted {
            timestamp: detection.timestamp,
            position,
        };

        let slot = self.admitted.get_or_create(detection.baton_id).await;
        let mut last = slot.lock().await;

        if let Verdict::Reject { speed_kmh } = self.filter.evaluate(last.as_ref(), &candidate) {
            tracing::debug!(
                baton_id = %detection.baton_id,
                beacon_id = %detection.beacon_id,
                speed_kmh,
                "detection rejected by speed filter"
            );
            return Ok(None);
        }

        let lap = self.inner.handle(detection).await?;
        if last.as_ref().is_none_or(|l| candidate.timestamp >= l.timestamp) {
            *last = Some(candidate);
        }
        Ok(lap)
    }
}
