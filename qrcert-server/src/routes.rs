//! Router configuration module
//!
//! Configures all routes, middleware layers, and creates the application router.

use std::{sync::Arc, time::Duration};

use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method, StatusCode},
    routing::{get, post},
    Router,
};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::handlers::{enroll_handler, health, ready, verify_handler};
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Create the application router with default config (for testing)
pub fn create_router(state: AppState) -> Router {
    create_router_with_config(state, &Config::default())
}

/// Create the application router with custom configuration
pub fn create_router_with_config(state: AppState, config: &Config) -> Router {
    // Configure CORS based on allowed_origins
    let cors = match &config.allowed_origins {
        Some(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            tracing::info!("CORS: Restricting to {} origin(s)", origins.len());
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
        }
        _ => {
            tracing::warn!("CORS: Allowing all origins (dev mode)");
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    };

    // Request body limit; the multipart extractor has its own 2 MB default
    let body_limit_bytes = config.body_limit_mb * 1024 * 1024;
    let body_limit = RequestBodyLimitLayer::new(body_limit_bytes);

    // Request timeout
    let timeout = TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        Duration::from_secs(config.timeout_secs),
    );

    // Base router with common layers
    let router = Router::new()
        .route("/enroll", post(enroll_handler))
        .route("/verify", post(verify_handler))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .layer(body_limit)
        .layer(timeout);

    // Conditionally apply rate limiting (disabled in tests, enabled in production)
    if !config.rate_limit_enabled {
        tracing::warn!("Rate limiting: DISABLED");
        return router.layer(TraceLayer::new_for_http());
    }

    let Some(governor_conf) = GovernorConfigBuilder::default()
        .per_second(config.rate_limit_per_sec)
        .burst_size(config.rate_limit_burst)
        .finish()
    else {
        tracing::error!(
            per_sec = config.rate_limit_per_sec,
            burst = config.rate_limit_burst,
            "Invalid rate limit settings, rate limiting DISABLED"
        );
        return router.layer(TraceLayer::new_for_http());
    };

    tracing::info!(
        "Rate limiting: {} req/s (burst: {})",
        config.rate_limit_per_sec,
        config.rate_limit_burst
    );

    router
        .layer(GovernorLayer::new(Arc::new(governor_conf)))
        .layer(TraceLayer::new_for_http())
}
