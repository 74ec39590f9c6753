//! Relay error types with HTTP status code mapping.
//!
//! [`RelayError`] is the central error type for the service. Most variants
//! never leave the ingestion path (they are logged at the boundary where
//! they occur), but every variant still maps to a status code and a
//! structured JSON body so the small HTTP surface can report them.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::domain::BeaconId;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "unknown baton address: AA:BB:CC:DD:EE:FF"
///   }
/// }
/// ```
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`RelayError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Service-wide error enum.
///
/// # Error Code Ranges
///
/// | Range     | Category                 | HTTP Status               |
/// |-----------|--------------------------|---------------------------|
/// | 1000–1999 | Wire / configuration     | 400 Bad Request           |
/// | 2000–2999 | Unregistered entities    | 404 Not Found             |
/// | 3000–3999 | Server / persistence     | 500 Internal Server Error |
/// | 4000–4999 | Registry consistency     | 409 Conflict              |
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// A beacon link sent a line that is not a valid detection message.
    #[error("malformed beacon message: {0}")]
    MalformedMessage(String),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A detection referenced a baton address that is not registered.
    #[error("unknown baton address: {0}")]
    UnknownBaton(String),

    /// A detection referenced a beacon address that is not registered.
    #[error("unknown beacon address: {0}")]
    UnknownBeacon(String),

    /// A resolved beacon has no entry in the position map.
    #[error("beacon {0} has no circuit position")]
    MissingPosition(BeaconId),

    /// Transport failure on a beacon link or the listener.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::MalformedMessage(_) => 1001,
            Self::InvalidConfig(_) => 1002,
            Self::UnknownBaton(_) => 2001,
            Self::UnknownBeacon(_) => 2002,
            Self::Internal(_) => 3000,
            Self::PersistenceError(_) => 3001,
            Self::Transport(_) => 3002,
            Self::MissingPosition(_) => 4001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedMessage(_) | Self::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            Self::UnknownBaton(_) | Self::UnknownBeacon(_) => StatusCode::NOT_FOUND,
            Self::MissingPosition(_) => StatusCode::CONFLICT,
            Self::PersistenceError(_) | Self::Transport(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<sqlx::Error> for RelayError {
    fn from(err: sqlx::Error) -> Self {
        Self::PersistenceError(err.to_string())
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_entities_are_distinct() {
        let baton = RelayError::UnknownBaton("AA".to_string());
        let beacon = RelayError::UnknownBeacon("BB".to_string());
        assert_ne!(baton.error_code(), beacon.error_code());
        assert_eq!(baton.status_code(), StatusCode::NOT_FOUND);
        assert!(beacon.to_string().contains("beacon"));
    }

    #[test]
    fn missing_position_is_conflict() {
        let err = RelayError::MissingPosition(BeaconId::new(7));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "beacon 7 has no circuit position");
    }

    #[test]
    fn io_errors_convert_to_transport() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = RelayError::from(io);
        assert_eq!(err.error_code(), 3002);
    }

    #[test]
    fn responses_carry_the_variant_status() {
        let response = RelayError::UnknownBaton("AA".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = RelayError::MalformedMessage("x".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
