//! Iris Prediction Service Library
//!
//! Serves a pre-trained Iris classifier over HTTP: `POST /predict` classifies
//! a four-measurement feature vector, `GET /info` describes the loaded model.

pub mod api;
pub mod config;
pub mod error;
pub mod health;
pub mod metrics;
pub mod models;
pub mod server;
pub mod state;
pub mod types;

pub use config::AppConfig;
pub use error::ServiceError;
pub use metrics::{MetricsReporter, ServiceMetrics};
pub use models::{Classifier, InferenceEngine};
pub use state::AppState;
pub use types::{IrisFeatures, PredictRequest, PredictionResponse};
