//! Shared harness: a full relay stack over an in-memory store, with the
//! beacon listener and the HTTP server on ephemeral loopback ports.

#![allow(dead_code, clippy::panic)]

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use relay_timing::aggregator::{AggregatorHandle, AggregatorHandler, BeaconAggregator};
use relay_timing::app_state::AppState;
use relay_timing::config::{ListenerMode, RelayConfig};
use relay_timing::domain::{EntityRegistry, EventBus, Lap};
use relay_timing::lapper::build_lappers;
use relay_timing::persistence::{MemoryStore, RaceStore};
use relay_timing::service::{DetectionPipeline, RetryPolicy};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub aggregator: AggregatorHandle,
    pub beacon_addr: SocketAddr,
    pub http_addr: SocketAddr,
}

/// Registers baton `T1` (on a team) and beacons `BX` at position 1 and `BY`
/// at position 2, then starts the stack.
pub async fn start() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let baton = store.register_baton("AA:00:00:00:00:01").await;
    store.register_beacon("BB:00:00:00:00:0X", 1).await;
    store.register_beacon("BB:00:00:00:00:0Y", 2).await;
    store.register_team("team one", Some(baton.id)).await;

    let config = RelayConfig::default();
    let registry = Arc::new(EntityRegistry::new());
    let Ok(()) = registry.refresh(store.as_ref()).await else {
        panic!("registry refresh failed");
    };
    let Ok(lappers) = build_lappers(&config, &registry, store.as_ref()).await else {
        panic!("building lappers failed");
    };
    let event_bus = EventBus::new(256);
    let dyn_store: Arc<dyn RaceStore> = store.clone();
    let pipeline = Arc::new(DetectionPipeline::new(
        Arc::clone(&registry),
        dyn_store,
        lappers,
        event_bus.clone(),
        RetryPolicy::new(1, Duration::ZERO),
    ));

    let handler: Arc<dyn AggregatorHandler> = pipeline.clone();
    let Ok(aggregator) = BeaconAggregator::new(
        ListenerMode::Tcp(0),
        IpAddr::V4(Ipv4Addr::LOCALHOST),
        handler,
    )
    .start()
    .await
    else {
        panic!("beacon listener failed to start");
    };
    let Some(beacon_addr) = aggregator.local_addr() else {
        panic!("listener has no address");
    };

    let app = relay_timing::build_app(AppState {
        registry,
        pipeline,
        aggregator: aggregator.status(),
        event_bus,
    });
    let Ok(http) = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await else {
        panic!("failed to bind HTTP listener");
    };
    let Ok(http_addr) = http.local_addr() else {
        panic!("HTTP listener has no address");
    };
    tokio::spawn(async move {
        let _ = axum::serve(http, app).await;
    });

    Harness {
        store,
        aggregator,
        beacon_addr,
        http_addr,
    }
}

/// Opens a beacon link.
pub async fn beacon_link(addr: SocketAddr) -> TcpStream {
    let Ok(stream) = TcpStream::connect(addr).await else {
        panic!("failed to connect to beacon listener");
    };
    stream
}

/// Writes one detection line in the legacy firmware format.
pub async fn send_detection(stream: &mut TcpStream, baton: &str, beacon: &str, millis: i64) {
    let line = format!(r#"{{"batonMAC":"{baton}","stationMAC":"{beacon}","time":{millis}}}"#);
    let Ok(()) = stream.write_all(format!("{line}\n").as_bytes()).await else {
        panic!("failed to write detection");
    };
}

/// Polls the store until at least `count` laps exist or two seconds pass.
pub async fn wait_for_laps(store: &MemoryStore, count: usize) -> Vec<Lap> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let laps = store.laps().await;
        if laps.len() >= count || tokio::time::Instant::now() >= deadline {
            return laps;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Polls the store until at least `count` detections exist or two seconds pass.
pub async fn wait_for_detections(store: &MemoryStore, count: usize) -> usize {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let n = store.detections().await.len();
        if n >= count || tokio::time::Instant::now() >= deadline {
            return n;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
