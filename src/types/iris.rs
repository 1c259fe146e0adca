//! Iris feature vector and the fixed label tables shared with training

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Number of measurements in one Iris sample
pub const FEATURE_COUNT: usize = 4;

/// Feature names in model input order
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] =
    ["sepal_length", "sepal_width", "petal_length", "petal_width"];

/// Class labels, positionally aligned with the model's class indices.
///
/// Must match the label order used when the model was trained.
pub const CLASS_LABELS: [&str; 3] = ["setosa", "versicolor", "virginica"];

/// Payload shown to clients alongside validation errors
pub const EXAMPLE_FEATURES: [f64; FEATURE_COUNT] = [5.1, 3.5, 1.4, 0.2];

/// One Iris sample, in model input order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IrisFeatures {
    pub sepal_length: f64,
    pub sepal_width: f64,
    pub petal_length: f64,
    pub petal_width: f64,
}

impl IrisFeatures {
    /// Create a sample from values in model input order
    pub fn from_array(values: [f64; FEATURE_COUNT]) -> Self {
        let [sepal_length, sepal_width, petal_length, petal_width] = values;
        Self {
            sepal_length,
            sepal_width,
            petal_length,
            petal_width,
        }
    }

    /// Values in model input order
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.sepal_length,
            self.sepal_width,
            self.petal_length,
            self.petal_width,
        ]
    }

    /// Wrap the sample as a single-row batch of shape (1, 4)
    pub fn to_batch(&self) -> Array2<f64> {
        Array2::from_shape_fn((1, FEATURE_COUNT), |(_, col)| self.to_array()[col])
    }
}
