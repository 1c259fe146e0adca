//! Server setup and lifecycle.

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::api;
use crate::config::ServerConfig;
use crate::health;
use crate::state::AppState;

/// Build the prediction server router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(api::home))
        .route("/predict", post(api::predict))
        .route("/info", get(api::info))
        .route("/health", get(health::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the configured host, which may be an address or a resolvable hostname.
pub async fn bind(config: &ServerConfig) -> anyhow::Result<TcpListener> {
    TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))
}

/// Serve until Ctrl-C or SIGTERM.
pub async fn serve(config: &ServerConfig, state: AppState) -> anyhow::Result<()> {
    let app = build_router(state);

    let listener = bind(config).await?;
    let addr = listener.local_addr().context("Failed to read bound address")?;

    info!("Iris prediction server listening on http://{}", addr);
    info!("  - / (GET): usage instructions");
    info!("  - /predict (POST): make predictions");
    info!("  - /info (GET): model information");
    info!("  - /health (GET): health check");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
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
                error!(error = %e, "Failed to listen for SIGTERM");
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

    info!("Shutdown signal received");
}
