//! API error type

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use mapsync_core::GateError;
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Every upstream was unreachable and nothing was stored (502)
    #[error("{0}")]
    UpstreamUnavailable(String),

    /// The record store could not be used (503)
    #[error("{0}")]
    StoreUnavailable(String),

    /// The request ran out of time (504)
    #[error("{0}")]
    Timeout(String),

    /// Internal server error (500)
    #[error("{0}")]
    Internal(String),
}

impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        let message = err.to_string();
        match err {
            GateError::UpstreamUnavailable(_) => ApiError::UpstreamUnavailable(message),
            GateError::StoreUnavailable(_) => ApiError::StoreUnavailable(message),
            GateError::Timeout(_) => ApiError::Timeout(message),
            GateError::SyncFailed(_) => ApiError::Internal(message),
        }
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::UpstreamUnavailable(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_UNAVAILABLE"),
            ApiError::StoreUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE")
            }
            ApiError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.parts();
        tracing::warn!("Request failed ({}): {}", error_code, self);

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}
