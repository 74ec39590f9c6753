//! Registry lookups, for diagnosing hardware that is not recognised.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{BatonDto, BeaconDto};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, RelayError};

/// `GET /batons/{address}`: the baton registered under a hardware address.
///
/// # Errors
///
/// Returns [`RelayError::UnknownBaton`] (404) if no baton has that address.
#[utoipa::path(
    get,
    path = "/batons/{address}",
    tag = "Registry",
    summary = "Look up a baton",
    description = "Resolves a baton hardware address the way detections are resolved.",
    params(("address" = String, Path, description = "Baton hardware address, any case")),
    responses(
        (status = 200, description = "Registered baton", body = BatonDto),
        (status = 404, description = "Address not registered", body = ErrorResponse),
    )
)]
pub async fn baton_handler(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<BatonDto>, RelayError> {
    let snapshot = state.registry.snapshot().await;
    let baton = snapshot
        .find_baton_by_address(&address)
        .ok_or(RelayError::UnknownBaton(address))?;
    let tracked = snapshot.tracked_batons().any(|id| id == baton.id);
    Ok(Json(BatonDto::new(baton, tracked)))
}

/// `GET /beacons/{address}`: the beacon registered under a hardware address.
///
/// # Errors
///
/// Returns [`RelayError::UnknownBeacon`] (404) if no beacon has that address.
#[utoipa::path(
    get,
    path = "/beacons/{address}",
    tag = "Registry",
    summary = "Look up a beacon",
    description = "Resolves a beacon hardware address and reports its circuit position.",
    params(("address" = String, Path, description = "Beacon hardware address, any case")),
    responses(
        (status = 200, description = "Registered beacon", body = BeaconDto),
        (status = 404, description = "Address not registered", body = ErrorResponse),
    )
)]
pub async fn beacon_handler(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<BeaconDto>, RelayError> {
    let snapshot = state.registry.snapshot().await;
    let beacon = snapshot
        .find_beacon_by_address(&address)
        .ok_or(RelayError::UnknownBeacon(address))?;
    Ok(Json(BeaconDto::from(beacon)))
}

/// Registry lookup routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/batons/{address}", get(baton_handler))
        .route("/beacons/{address}", get(beacon_handler))
}
