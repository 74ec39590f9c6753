//! # relay-timing
//!
//! Ingestion core of a relay-race lap-timing system.
//!
//! Beacons placed around a circuit sense batons carried by runners and
//! report each sighting over a long-lived TCP link. This crate accepts those
//! links, resolves hardware addresses to registered batons and beacons,
//! records every detection, and runs one or more lap-determination engines
//! whose laps are recorded alongside.
//!
//! ## Architecture
//!
//! ```text
//! Beacon devices (TCP, newline-delimited JSON)
//!     │
//!     ├── BeaconAggregator (aggregator/)   one task per link
//!     │
//!     ├── DetectionPipeline (service/)
//!     │     ├── EntityRegistry (domain/)    address → entity, positions
//!     │     ├── RaceStore (persistence/)    detections, laps
//!     │     └── Lappers (lapper/)           positional, speed-filtered
//!     │
//!     ├── EventBus (domain/)
//!     │
//!     └── HTTP: /health, /status, registry lookups (api/), /ws live feed (ws/)
//! ```

pub mod aggregator;
pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod lapper;
pub mod persistence;
pub mod service;
pub mod ws;

use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

/// Upper bound on the time a REST request may take.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds the complete HTTP application: REST endpoints, the `/ws` live
/// feed, request tracing, a request timeout and permissive CORS.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws::handler::ws_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    REQUEST_TIMEOUT,
                ))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
