//! relay-timing server entry point.
//!
//! Wires storage, the entity registry, the lappers and the detection
//! pipeline behind the beacon aggregator, then serves the HTTP surface
//! until interrupted.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use relay_timing::aggregator::{AggregatorHandler, BeaconAggregator};
use relay_timing::app_state::AppState;
use relay_timing::config::{LogFormat, RelayConfig};
use relay_timing::domain::{EntityRegistry, EventBus};
use relay_timing::lapper::build_lappers;
use relay_timing::persistence::{MemoryStore, PostgresStore, RaceStore};
use relay_timing::service::{DetectionPipeline, RetryPolicy, spawn_registry_refresh};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = RelayConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    tracing::info!(
        addr = %config.listen_addr,
        beacon_port = config.beacon_port,
        "starting relay-timing"
    );

    // Storage
    let store: Arc<dyn RaceStore> = if config.persistence_enabled {
        Arc::new(
            PostgresStore::connect(&config)
                .await
                .context("connecting to the race database")?,
        )
    } else {
        tracing::warn!("persistence disabled, detections and laps are kept in memory");
        Arc::new(MemoryStore::new())
    };

    // Domain layer
    let registry = Arc::new(EntityRegistry::new());
    registry
        .refresh(store.as_ref())
        .await
        .context("loading batons and beacons")?;
    let event_bus = EventBus::new(config.event_bus_capacity);

    // Lappers and pipeline
    let lappers = build_lappers(&config, &registry, store.as_ref()).await?;
    let pipeline = Arc::new(DetectionPipeline::new(
        Arc::clone(&registry),
        Arc::clone(&store),
        lappers,
        event_bus.clone(),
        RetryPolicy::from_config(&config),
    ));

    // Beacon aggregator
    let handler: Arc<dyn AggregatorHandler> = pipeline.clone();
    let aggregator = BeaconAggregator::new(
        config.listener_mode(),
        config.beacon_bind_host,
        handler,
    )
    .start()
    .await
    .context("starting the beacon listener")?;

    let refresh = spawn_registry_refresh(
        Arc::clone(&registry),
        Arc::clone(&store),
        Duration::from_secs(config.registry_refresh_secs),
    );

    // HTTP surface
    let app_state = AppState {
        registry,
        pipeline,
        aggregator: aggregator.status(),
        event_bus,
    };
    let app = relay_timing::build_app(app_state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding HTTP listener on {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    refresh.abort();
    aggregator
        .shutdown(Duration::from_secs(config.shutdown_grace_secs))
        .await;
    tracing::info!("relay-timing stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown requested");
}
