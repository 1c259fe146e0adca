//! Inference engine: the model handle plus the Iris label tables

use crate::config::AppConfig;
use crate::error::ServiceError;
use crate::models::classifier::Classifier;
use crate::models::loader::ModelLoader;
use crate::types::iris::{IrisFeatures, CLASS_LABELS, FEATURE_COUNT, FEATURE_NAMES};
use crate::types::response::{InfoResponse, ModelParameters, PredictedClass, PredictionResponse};
use anyhow::{ensure, Result};
use tracing::{debug, info, warn};

/// Result of classifying one sample
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub class_id: usize,
    pub class_name: String,
    /// Probability per class label, in class index order
    pub probabilities: Vec<(String, f64)>,
    pub features: IrisFeatures,
}

impl Prediction {
    /// Shape the prediction as the `/predict` response body
    pub fn to_response(&self) -> PredictionResponse {
        PredictionResponse {
            prediction: PredictedClass {
                class_id: self.class_id,
                class_name: self.class_name.clone(),
            },
            probabilities: self.probabilities.iter().cloned().collect(),
            input_features: self.features,
        }
    }
}

/// Read-only inference engine shared by all request handlers
pub struct InferenceEngine {
    model: Box<dyn Classifier>,
    class_labels: Vec<String>,
}

impl InferenceEngine {
    /// Load the configured model. Any failure here is fatal for the service.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let loader = ModelLoader::with_threads(config.model.onnx_threads);
        let model = loader.load(&config.model.path)?;
        Self::with_model(model)
    }

    /// Wrap an already loaded model using the Iris class labels
    pub fn with_model(model: Box<dyn Classifier>) -> Result<Self> {
        Self::with_labels(model, CLASS_LABELS.iter().map(|l| l.to_string()).collect())
    }

    /// Wrap a model with a custom class label table
    pub fn with_labels(model: Box<dyn Classifier>, class_labels: Vec<String>) -> Result<Self> {
        ensure!(
            model.n_features() == FEATURE_COUNT,
            "Model expects {} features, the service provides {}",
            model.n_features(),
            FEATURE_COUNT
        );
        ensure!(
            model.feature_importances().len() == FEATURE_COUNT,
            "Model reports {} feature importances, expected {}",
            model.feature_importances().len(),
            FEATURE_COUNT
        );

        // Label alignment is a contract with training; it cannot be proven here
        if model.n_classes() != class_labels.len() {
            warn!(
                n_classes = model.n_classes(),
                labels = class_labels.len(),
                "Model class count differs from the class label table"
            );
        }

        info!(
            model_type = %model.model_type(),
            n_estimators = model.n_estimators(),
            classes = ?class_labels,
            "Inference engine initialized"
        );

        Ok(Self {
            model,
            class_labels,
        })
    }

    /// Estimator name of the loaded model
    pub fn model_type(&self) -> &str {
        self.model.model_type()
    }

    /// Classify one sample
    pub fn predict(&self, features: &IrisFeatures) -> Result<Prediction, ServiceError> {
        let batch = features.to_batch();
        let (classes, proba) = self.model.predict_with_proba(batch.view())?;

        let class_id = *classes
            .first()
            .ok_or_else(|| ServiceError::Inference("Model returned no prediction".to_string()))?;
        let class_name = self.label(class_id)?.to_string();

        if proba.ncols() > self.class_labels.len() {
            return Err(ServiceError::LabelOutOfRange {
                index: self.class_labels.len(),
                labels: self.class_labels.len(),
            });
        }
        let probabilities = self
            .class_labels
            .iter()
            .cloned()
            .zip(proba.row(0).iter().copied())
            .collect();

        debug!(class_id, class_name = %class_name, "Sample classified");

        Ok(Prediction {
            class_id,
            class_name,
            probabilities,
            features: *features,
        })
    }

    /// Model attributes for the `/info` endpoint
    pub fn info(&self) -> InfoResponse {
        InfoResponse {
            model_type: self.model.model_type().to_string(),
            parameters: ModelParameters {
                n_estimators: self.model.n_estimators(),
            },
            feature_importances: FEATURE_NAMES
                .iter()
                .map(|name| name.to_string())
                .zip(self.model.feature_importances().iter().copied())
                .collect(),
            classes: self.class_labels.clone(),
        }
    }

    fn label(&self, class_id: usize) -> Result<&str, ServiceError> {
        self.class_labels
            .get(class_id)
            .map(String::as_str)
            .ok_or(ServiceError::LabelOutOfRange {
                index: class_id,
                labels: self.class_labels.len(),
            })
    }
}
