//! HTTP control surface
//!
//! Listens on localhost TCP for requests from the CLI and external
//! integrators. JSON in, JSON out; errors carry the taxonomy kind in
//! the body so callers can branch without parsing prose.

mod handlers;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use mr_core::api::ErrorBody;
use mr_core::error::RelayError;

use crate::state::HubState;

/// Build the hub router over shared state
pub fn router(state: Arc<HubState>) -> Router {
    Router::new()
        .route(
            "/instances",
            get(handlers::list_instances).post(handlers::create_instance),
        )
        .route("/instances/:id/qr", get(handlers::instance_pairing))
        .route("/instances/:id/status", get(handlers::instance_status))
        .route("/instances/:id/reset", post(handlers::reset_instance))
        .route(
            "/instances/:id/disconnect",
            post(handlers::disconnect_instance),
        )
        .route("/status", get(handlers::hub_status))
        .route("/health", get(handlers::hub_status))
        .route("/send-message", post(handlers::send_message))
        .with_state(state)
}

/// Serve the API until the shutdown token fires.
///
/// Binds before returning control to the caller so startup failures
/// surface as errors instead of a dead endpoint.
pub async fn serve(
    state: Arc<HubState>,
    listener: TcpListener,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr = listener
        .local_addr()
        .context("Failed to read bound address")?;
    tracing::info!("HTTP API listening on {}", addr);

    let app = router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("HTTP server terminated abnormally")?;

    tracing::info!("HTTP API stopped");
    Ok(())
}

/// Error wrapper that renders `RelayError` as a JSON response
pub struct ApiError(pub RelayError);

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            RelayError::NotFound(_) => StatusCode::NOT_FOUND,
            // Duplicate creation is a caller mistake, not a conflict to retry
            RelayError::AlreadyExists(_) | RelayError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            RelayError::NotConnected(_) => StatusCode::CONFLICT,
            RelayError::TransportFailure(_) | RelayError::AuthFailure(_) => {
                StatusCode::BAD_GATEWAY
            }
            RelayError::Store(_) | RelayError::Config(_) | RelayError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = ErrorBody {
            error: self.0.kind().to_string(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let response = ApiError(RelayError::NotFound("x".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_duplicate_maps_to_400() {
        let response = ApiError(RelayError::AlreadyExists("x".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_connected_maps_to_409() {
        let response = ApiError(RelayError::NotConnected("x".into())).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_transport_failure_maps_to_502() {
        let response = ApiError(RelayError::TransportFailure("x".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
