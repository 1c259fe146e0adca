//! Response bodies returned by the prediction service

use crate::types::iris::IrisFeatures;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Predicted class of a sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedClass {
    pub class_id: usize,
    pub class_name: String,
}

/// Body of a successful `/predict` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub prediction: PredictedClass,
    /// Probability per class label
    pub probabilities: BTreeMap<String, f64>,
    /// The request's features under their semantic names
    pub input_features: IrisFeatures,
}

/// Hyperparameters reported by `/info`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    pub n_estimators: usize,
}

/// Body of the `/info` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoResponse {
    pub model_type: String,
    pub parameters: ModelParameters,
    /// Importance score per feature name
    pub feature_importances: BTreeMap<String, f64>,
    pub classes: Vec<String>,
}
