//! Error types for the prediction service
//!
//! Client mistakes map to 400 with an example payload; everything that goes
//! wrong after validation maps to 500 with the failure message.

use crate::types::iris::EXAMPLE_FEATURES;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Errors returned by request handlers
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Body is not a JSON object carrying `features`
    #[error("Invalid request. Please provide features in JSON format.")]
    InvalidRequest,

    /// `features` is not a list of four values
    #[error("Features must be a list of 4 numeric values (sepal length, sepal width, petal length, petal width)")]
    InvalidShape,

    /// Numeric coercion or model runtime failure
    #[error("{0}")]
    Inference(String),

    /// Model returned a class the label table does not know
    #[error("predicted class index {index} is out of range for {labels} class labels")]
    LabelOutOfRange { index: usize, labels: usize },
}

impl ServiceError {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::InvalidRequest | ServiceError::InvalidShape => StatusCode::BAD_REQUEST,
            ServiceError::Inference(_) | ServiceError::LabelOutOfRange { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable name used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::InvalidRequest => "invalid_request",
            ServiceError::InvalidShape => "invalid_shape",
            ServiceError::Inference(_) => "inference",
            ServiceError::LabelOutOfRange { .. } => "label_out_of_range",
        }
    }

    /// Whether the client caused the error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        ServiceError::Inference(format!("{err:#}"))
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = if self.is_client_error() {
            json!({
                "error": self.to_string(),
                "example": { "features": EXAMPLE_FEATURES },
            })
        } else {
            json!({ "error": self.to_string() })
        };

        (status, Json(body)).into_response()
    }
}
