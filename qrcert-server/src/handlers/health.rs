//! Health check handlers
//!
//! Provides health and readiness endpoints for monitoring and orchestration.

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

/// Health check response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status: "healthy" or "degraded"
    #[schema(example = "healthy")]
    pub status: &'static str,
    /// Server version from Cargo.toml
    pub version: &'static str,
    /// Service name
    pub service: &'static str,
    /// Whether a reference digest is enrolled
    pub reference_enrolled: bool,
    /// Feature schema version of the loaded classifier
    #[schema(example = "domain-v1")]
    pub model_schema: String,
}

/// GET /health - Health check endpoint
///
/// Reports degraded while no reference digest is enrolled (every verification
/// would be `unverifiable`) or the reference store cannot be read.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses((status = 200, description = "Service status", body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let reference_enrolled = match state.references().load().await {
        Ok(digest) => digest.is_some(),
        Err(e) => {
            tracing::warn!(error = %e, "Reference store unreadable during health check");
            false
        }
    };

    let status = if reference_enrolled {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        service: "qrcert-server",
        reference_enrolled,
        model_schema: state.model_schema().to_string(),
    })
}

/// Readiness response for Kubernetes
#[derive(Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Whether the service is ready to accept traffic
    pub ready: bool,
    /// Optional message explaining status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

/// GET /ready - Kubernetes readiness probe
///
/// The model is loaded before the listener binds, so a running server is ready
/// unless it is shutting down.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "Health",
    responses((status = 200, description = "Readiness", body = ReadyResponse))
)]
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    if state.shutdown.is_cancelled() {
        return Json(ReadyResponse {
            ready: false,
            message: Some("shutting down"),
        });
    }
    Json(ReadyResponse {
        ready: true,
        message: None,
    })
}
