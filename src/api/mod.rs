//! REST API layer: route handlers, DTOs, and router composition.
//!
//! The surface is read-only: health, ingestion status, registry lookups
//! and the OpenAPI document. Entity administration happens directly in the
//! database.

pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI document of the REST endpoints.
#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "relay-timing", description = "Beacon ingestion and lap timing"),
    paths(
        handlers::system::health_handler,
        handlers::system::status_handler,
        handlers::registry::baton_handler,
        handlers::registry::beacon_handler,
    ),
    components(schemas(
        dto::HealthResponse,
        dto::StatusResponse,
        dto::ListenerDto,
        dto::LinkDto,
        dto::RegistryDto,
        dto::LapperDto,
        dto::BatonDto,
        dto::BeaconDto,
        crate::service::PipelineStats,
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
    )),
    tags(
        (name = "System", description = "Health and status"),
        (name = "Registry", description = "Hardware address lookups"),
    )
)]
pub struct ApiDoc;

/// Builds the REST router, plus Swagger UI when the `swagger-ui` feature
/// is enabled.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .merge(handlers::system::routes())
        .merge(handlers::registry::routes());

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_system_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/health"));
        assert!(doc.paths.paths.contains_key("/status"));
        assert!(doc.paths.paths.contains_key("/batons/{address}"));
    }
}
