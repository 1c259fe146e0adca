//! Shared application state handed to every request handler.

use crate::metrics::ServiceMetrics;
use crate::models::InferenceEngine;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Shared state for the prediction server.
#[derive(Clone)]
pub struct AppState {
    /// The loaded model, read-only for the process lifetime.
    pub engine: Arc<InferenceEngine>,
    /// Request counters and latencies.
    pub metrics: Arc<ServiceMetrics>,
    /// When the service finished loading.
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Create state around a loaded engine with fresh metrics.
    pub fn new(engine: InferenceEngine) -> Self {
        Self::with_metrics(Arc::new(engine), Arc::new(ServiceMetrics::new()))
    }

    /// Create state sharing an existing metrics collector.
    pub fn with_metrics(engine: Arc<InferenceEngine>, metrics: Arc<ServiceMetrics>) -> Self {
        Self {
            engine,
            metrics,
            started_at: Utc::now(),
        }
    }
}
