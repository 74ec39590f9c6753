//! System endpoints: health check and ingestion status.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;

use crate::api::dto::{
    HealthResponse, LapperDto, LinkDto, ListenerDto, RegistryDto, StatusResponse,
};
use crate::app_state::AppState;

/// `GET /health`: Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// `GET /status`: Listener, links, registry and pipeline counters.
#[utoipa::path(
    get,
    path = "/status",
    tag = "System",
    summary = "Ingestion status",
    description = "Returns the beacon listener mode, open beacon links, registry summary, \
                   enabled lap sources and pipeline counters.",
    responses(
        (status = 200, description = "Current ingestion status", body = StatusResponse),
    )
)]
pub async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.registry.snapshot().await;
    let links = state
        .aggregator
        .links
        .snapshot()
        .await
        .into_iter()
        .map(LinkDto::from)
        .collect();

    let body = StatusResponse {
        listener: ListenerDto::from_status(&state.aggregator),
        links,
        registry: RegistryDto::from(snapshot.as_ref()),
        lappers: state
            .pipeline
            .lappers()
            .iter()
            .map(|l| LapperDto::from_lapper(l.as_ref()))
            .collect(),
        pipeline: state.pipeline.stats(),
    };
    (StatusCode::OK, Json(body))
}

/// System routes mounted at the root level.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
}
