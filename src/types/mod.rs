//! Type definitions for the prediction service API

pub mod iris;
pub mod request;
pub mod response;

pub use iris::{IrisFeatures, CLASS_LABELS, FEATURE_NAMES};
pub use request::PredictRequest;
pub use response::{InfoResponse, PredictionResponse};
