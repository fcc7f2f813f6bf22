//! QRCert Server - REST API for hospital certificate verification
//!
//! Exposes qrcert-core functionality via HTTP endpoints:
//! - POST /enroll - Register the genuine certificate image
//! - POST /verify - Verify an uploaded certificate image

use std::net::SocketAddr;
use std::process::ExitCode;

use qrcert_server::{build_pipeline, create_router_with_config, AppState, Config};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("qrcert_server=info,qrcert_core=info,tower_http=info")),
        )
        .with_target(true)
        .init();

    let config = Config::from_env();

    // Model and schema problems abort startup rather than surfacing per request
    let pipeline = match build_pipeline(&config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            tracing::error!(
                error = %e,
                model = %config.model_path.display(),
                schema = %config.feature_schema,
                "Failed to initialise verification pipeline"
            );
            return ExitCode::FAILURE;
        }
    };

    if config.enroll_token.is_none() {
        tracing::warn!("ENROLL_TOKEN not set: reference enrollment is open to anyone (dev mode)");
    }
    if config.known_good_urls.is_empty() {
        tracing::info!("No KNOWN_GOOD_URLS configured, every URL goes to the classifier");
    }

    let state = AppState::new(pipeline, &config);
    let shutdown = state.shutdown.clone();
    let app = create_router_with_config(state, &config);

    let addr = config.socket_addr();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind listener");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        %addr,
        model = %config.model_path.display(),
        schema = %config.feature_schema,
        reference = %config.reference_digest_path.display(),
        "QRCert server listening"
    );

    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown))
    .await;

    if let Err(e) = served {
        tracing::error!(error = %e, "Server error");
        return ExitCode::FAILURE;
    }
    tracing::info!("Server stopped");
    ExitCode::SUCCESS
}

/// Resolves on Ctrl-C or SIGTERM, cancelling in-flight verifications.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
