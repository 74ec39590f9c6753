//! Detection pipeline: resolves raw detections, records them, feeds the
//! lappers and records the laps they emit.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;

use super::RetryPolicy;
use crate::aggregator::{AggregatorHandler, ConnectionInfo};
use crate::domain::{
    Detection, EntityRegistry, EventBus, Lap, RaceEvent, RawDetection, ResolveError,
};
use crate::error::RelayError;
use crate::lapper::Lapper;
use crate::persistence::RaceStore;

/// Counters exposed on the status endpoint.
#[derive(Debug, Default)]
struct PipelineCounters {
    received: AtomicU64,
    unregistered: AtomicU64,
    recorded: AtomicU64,
    laps: AtomicU64,
    write_failures: AtomicU64,
    link_errors: AtomicU64,
}

/// Point-in-time copy of the pipeline counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct PipelineStats {
    /// Detections parsed from beacon links.
    pub received: u64,
    /// Detections dropped because an address was not registered.
    pub unregistered: u64,
    /// Detections written to storage.
    pub recorded: u64,
    /// Laps emitted by all lappers.
    pub laps: u64,
    /// Detection or lap writes dropped after exhausting retries.
    pub write_failures: u64,
    /// Malformed messages and transport faults reported by links.
    pub link_errors: u64,
}

/// Orchestrates the path from a raw detection to recorded laps.
///
/// Registered as the aggregator's handler. For each detection:
/// resolve → record → every lapper → record emitted laps, publishing
/// progress on the [`EventBus`].
#[derive(Debug)]
pub struct DetectionPipeline {
    registry: Arc<EntityRegistry>,
    store: Arc<dyn RaceStore>,
    lappers: Vec<Arc<dyn Lapper>>,
    event_bus: EventBus,
    retry: RetryPolicy,
    counters: PipelineCounters,
}

impl DetectionPipeline {
    /// Creates a pipeline over the given collaborators.
    #[must_use]
    pub fn new(
        registry: Arc<EntityRegistry>,
        store: Arc<dyn RaceStore>,
        lappers: Vec<Arc<dyn Lapper>>,
        event_bus: EventBus,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            registry,
            store,
            lappers,
            event_bus,
            retry,
            counters: PipelineCounters::default(),
        }
    }

    /// Enabled lappers.
    #[must_use]
    pub fn lappers(&self) -> &[Arc<dyn Lapper>] {
        &self.lappers
    }

    /// Returns the current counters.
    #[must_use]
    pub fn stats(&self) -> PipelineStats {
        let c = &self.counters;
        PipelineStats {
            received: c.received.load(Ordering::Relaxed),
            unregistered: c.unregistered.load(Ordering::Relaxed),
            recorded: c.recorded.load(Ordering::Relaxed),
            laps: c.laps.load(Ordering::Relaxed),
            write_failures: c.write_failures.load(Ordering::Relaxed),
            link_errors: c.link_errors.load(Ordering::Relaxed),
        }
    }

    /// Runs one raw detection through the pipeline and returns the laps it
    /// completed.
    ///
    /// # Errors
    ///
    /// Returns the [`ResolveError`] when an address is unregistered; the
    /// detection is then dropped without touching storage or lappers.
    pub async fn process(&self, raw: RawDetection) -> Result<Vec<Lap>, ResolveError> {
        self.counters.received.fetch_add(1, Ordering::Relaxed);

        let resolved = match self.registry.resolve(&raw).await {
            Ok(resolved) => resolved,
            Err(err) => {
                self.counters.unregistered.fetch_add(1, Ordering::Relaxed);
                for missing in err.clone().into_relay_errors() {
                    tracing::warn!(code = missing.error_code(), "{missing}; detection dropped");
                }
                return Err(err);
            }
        };

        let detection = resolved.into_detection(raw.time);
        self.record_detection(&detection).await;

        let mut laps = Vec::new();
        for lapper in &self.lappers {
            match lapper.handle(&detection).await {
                Ok(Some(lap)) => {
                    self.record_lap(lapper.as_ref(), &lap).await;
                    laps.push(lap);
                }
                Ok(None) => {}
                Err(err @ RelayError::MissingPosition(_)) => {
                    tracing::error!(
                        source = lapper.source_name(),
                        baton_id = %detection.baton_id,
                        error = %err,
                        "registry and position map disagree; detection skipped for lap determination"
                    );
                }
                Err(err) => {
                    tracing::error!(
                        source = lapper.source_name(),
                        baton_id = %detection.baton_id,
                        error = %err,
                        "lapper failed"
                    );
                }
            }
        }
        Ok(laps)
    }

    async fn record_detection(&self, detection: &Detection) {
        let stored = self
            .retry
            .run("detection", || self.store.insert_detection(detection))
            .await;
        match stored {
            Ok(()) => {
                self.counters.recorded.fetch_add(1, Ordering::Relaxed);
                self.event_bus.publish(RaceEvent::DetectionRecorded {
                    baton_id: detection.baton_id,
                    beacon_id: detection.beacon_id,
                    timestamp: detection.timestamp,
                });
            }
            Err(err) => {
                self.counters.write_failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    baton_id = %detection.baton_id,
                    beacon_id = %detection.beacon_id,
                    timestamp = %detection.timestamp,
                    attempts = self.retry.attempts(),
                    error = %err,
                    "detection not recorded"
                );
            }
        }
    }

    async fn record_lap(&self, lapper: &dyn Lapper, lap: &Lap) {
        self.counters.laps.fetch_add(1, Ordering::Relaxed);
        let stored = self.retry.run("lap", || self.store.insert_lap(lap)).await;
        if let Err(err) = stored {
            self.counters.write_failures.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                baton_id = %lap.baton_id,
                source = lapper.source_name(),
                timestamp = %lap.timestamp,
                attempts = self.retry.attempts(),
                error = %err,
                "lap not recorded"
            );
        }
        tracing::info!(
            baton_id = %lap.baton_id,
            source = lapper.source_name(),
            timestamp = %lap.timestamp,
            "lap completed"
        );
        self.event_bus.publish(RaceEvent::LapCompleted {
            baton_id: lap.baton_id,
            lap_source_id: lap.lap_source_id,
            source_name: lapper.source_name().to_string(),
            timestamp: lap.timestamp,
        });
    }
}

#[async_trait]
impl AggregatorHandler for DetectionPipeline {
    async fn on_connect(&self, info: &ConnectionInfo) {
        tracing::info!(connection_id = %info.id, peer = %info.peer, "beacon connected");
        self.event_bus.publish(RaceEvent::BeaconConnected {
            connection_id: info.id,
            peer: info.peer,
            timestamp: info.connected_at,
        });
    }

    async fn on_disconnect(&self, info: &ConnectionInfo) {
        tracing::info!(connection_id = %info.id, peer = %info.peer, "beacon disconnected");
        self.event_bus.publish(RaceEvent::BeaconDisconnected {
            connection_id: info.id,
            peer: info.peer,
            timestamp: Utc::now(),
        });
    }

    async fn on_data(&self, info: &ConnectionInfo, detection: RawDetection) {
        tracing::debug!(
            connection_id = %info.id,
            baton = %detection.baton_address,
            beacon = %detection.beacon_address,
            time = %detection.time,
            "detection received"
        );
        let _ = self.process(detection).await;
    }

    async fn on_error(&self, info: &ConnectionInfo, error: RelayError) {
        self.counters.link_errors.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            connection_id = %info.id,
            peer = %info.peer,
            code = error.error_code(),
            error = %error,
            "beacon link error"
        );
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;
    use crate::domain::BatonId;
    use crate::lapper::build_lappers;
    use crate::persistence::MemoryStore;
    use chrono::{DateTime, Utc};
    use std::time::Duration;

    struct Fixture {
        store: Arc<MemoryStore>,
        pipeline: DetectionPipeline,
        events: tokio::sync::broadcast::Receiver<RaceEvent>,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let baton = store.register_baton("T1").await;
        store.register_beacon("BX", 1).await;
        store.register_beacon("BY", 2).await;
        store.register_team("test", Some(baton.id)).await;

        let registry = Arc::new(EntityRegistry::new());
        if registry.refresh(store.as_ref()).await.is_err() {
            panic!("refresh failed");
        }
        let Ok(lappers) = build_lappers(&RelayConfig::default(), &registry, store.as_ref()).await
        else {
            panic!("building lappers failed");
        };
        let bus = EventBus::new(64);
        let events = bus.subscribe();
        let pipeline = DetectionPipeline::new(
            registry,
            Arc::clone(&store) as Arc<dyn RaceStore>,
            lappers,
            bus,
            RetryPolicy::new(2, Duration::from_millis(1)),
        );
        Fixture {
            store,
            pipeline,
            events,
        }
    }

    fn raw(baton: &str, beacon: &str, secs: i64) -> RawDetection {
        RawDetection {
            baton_address: baton.to_string(),
            beacon_address: beacon.to_string(),
            time: DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_default(),
        }
    }

    #[tokio::test]
    async fn example_race_emits_one_lap() {
        let fx = fixture().await;
        let p = &fx.pipeline;

        assert_eq!(p.process(raw("T1", "BX", 0)).await.map(|l| l.len()), Ok(0));
        assert_eq!(p.process(raw("T1", "BY", 5)).await.map(|l| l.len()), Ok(0));
        let Ok(laps) = p.process(raw("T1", "BX", 12)).await else {
            panic!("processing failed");
        };

        assert_eq!(laps.len(), 1);
        let stored = fx.store.laps().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored.first().map(|l| l.timestamp.timestamp()), Some(12));
        assert_eq!(stored.first().map(|l| l.baton_id), Some(BatonId::new(1)));
        assert_eq!(fx.store.detections().await.len(), 3);
    }

    #[tokio::test]
    async fn unknown_beacon_is_dropped_before_storage() {
        let fx = fixture().await;
        let p = &fx.pipeline;
        let _ = p.process(raw("T1", "BX", 0)).await;

        let result = p.process(raw("T1", "BZ", 20)).await;
        assert_eq!(result, Err(ResolveError::UnknownBeacon("BZ".to_string())));
        let result = p.process(raw("T9", "BX", 21)).await;
        assert_eq!(result, Err(ResolveError::UnknownBaton("T9".to_string())));

        assert_eq!(fx.store.detections().await.len(), 1);
        let stats = p.stats();
        assert_eq!(stats.received, 3);
        assert_eq!(stats.unregistered, 2);
        assert_eq!(stats.recorded, 1);
    }

    #[tokio::test]
    async fn failed_detection_write_still_reaches_lappers() {
        let fx = fixture().await;
        let p = &fx.pipeline;
        let _ = p.process(raw("T1", "BX", 0)).await;
        let _ = p.process(raw("T1", "BY", 5)).await;

        // Both attempts for the next detection fail.
        fx.store.fail_next_inserts(2);
        let Ok(laps) = p.process(raw("T1", "BX", 12)).await else {
            panic!("processing failed");
        };

        assert_eq!(laps.len(), 1);
        assert_eq!(fx.store.detections().await.len(), 2);
        assert_eq!(fx.store.laps().await.len(), 1);
        assert_eq!(p.stats().write_failures, 1);
    }

    #[tokio::test]
    async fn failed_lap_write_is_counted_and_still_published() {
        let mut fx = fixture().await;
        let p = &fx.pipeline;
        let _ = p.process(raw("T1", "BX", 0)).await;

        // Both attempts for the lap fail; the closing detection is stored.
        fx.store.fail_next_lap_inserts(2);
        let Ok(laps) = p.process(raw("T1", "BX", 30)).await else {
            panic!("processing failed");
        };

        assert_eq!(laps.len(), 1);
        assert!(fx.store.laps().await.is_empty());
        assert_eq!(fx.store.detections().await.len(), 2);
        let stats = p.stats();
        assert_eq!(stats.laps, 1);
        assert_eq!(stats.write_failures, 1);

        let mut kinds = Vec::new();
        while let Ok(event) = fx.events.try_recv() {
            kinds.push(event.event_type_str());
        }
        assert_eq!(kinds.last(), Some(&"lap_completed"));
    }

    #[tokio::test]
    async fn publishes_detection_and_lap_events() {
        let mut fx = fixture().await;
        let _ = fx.pipeline.process(raw("T1", "BX", 0)).await;
        let _ = fx.pipeline.process(raw("T1", "BX", 30)).await;

        let mut kinds = Vec::new();
        while let Ok(event) = fx.events.try_recv() {
            kinds.push(event.event_type_str());
        }
        assert_eq!(
            kinds,
            vec!["detection_recorded", "detection_recorded", "lap_completed"]
        );
    }
}
