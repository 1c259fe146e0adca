//! Iris Prediction Service - Main Entry Point
//!
//! Loads the trained classifier once and serves predictions over HTTP.

use anyhow::Result;
use iris_prediction_service::{
    config::{AppConfig, LogFormat, LoggingConfig},
    metrics::{MetricsReporter, ServiceMetrics},
    models::InferenceEngine,
    server,
    state::AppState,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;

    init_logging(&config.logging);

    info!("Starting Iris Prediction Service");
    info!(
        model_path = %config.model.path,
        host = %config.server.host,
        port = config.server.port,
        "Configuration loaded successfully"
    );

    // The service never starts without a model
    let engine = match InferenceEngine::new(&config) {
        Ok(engine) => engine,
        Err(e) => {
            error!(error = %format!("{e:#}"), path = %config.model.path, "Failed to load model");
            return Err(e);
        }
    };

    let metrics = Arc::new(ServiceMetrics::new());

    if config.metrics.report_interval_secs > 0 {
        let metrics_clone = metrics.clone();
        let interval_secs = config.metrics.report_interval_secs;
        tokio::spawn(async move {
            let reporter = MetricsReporter::new(metrics_clone, interval_secs);
            reporter.start().await;
        });
    }

    let state = AppState::with_metrics(Arc::new(engine), metrics.clone());
    server::serve(&config.server, state).await?;

    // Print final summary
    info!("Prediction service shutting down...");
    metrics.print_summary();

    Ok(())
}

/// RUST_LOG wins when set; otherwise the configured level applies to this
/// crate and the HTTP trace layer.
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,iris_prediction_service={level},tower_http={level}",
            level = logging.level
        ))
    });

    match logging.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}
