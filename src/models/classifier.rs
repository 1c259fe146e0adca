//! Inference surface shared by every model runtime

use anyhow::{bail, Result};
use ndarray::{Array2, ArrayView1, ArrayView2};

/// A trained classifier, read-only after loading.
///
/// Batches are `(n_samples, n_features)`; probabilities come back as
/// `(n_samples, n_classes)` with rows summing to 1.
pub trait Classifier: Send + Sync {
    /// Name of the estimator, e.g. `RandomForestClassifier`
    fn model_type(&self) -> &str;

    /// Number of input features per sample
    fn n_features(&self) -> usize;

    /// Number of classes the model can predict
    fn n_classes(&self) -> usize;

    /// Number of estimators in the ensemble
    fn n_estimators(&self) -> usize;

    /// Importance per feature, in input order, summing to 1
    fn feature_importances(&self) -> &[f64];

    /// Predicted class index per sample
    fn predict(&self, batch: ArrayView2<'_, f64>) -> Result<Vec<usize>>;

    /// Class probabilities per sample
    fn predict_proba(&self, batch: ArrayView2<'_, f64>) -> Result<Array2<f64>>;

    /// Predicted classes and probabilities in one call
    fn predict_with_proba(&self, batch: ArrayView2<'_, f64>) -> Result<(Vec<usize>, Array2<f64>)> {
        Ok((self.predict(batch)?, self.predict_proba(batch)?))
    }
}

/// Reject batches whose width does not match the model input
pub fn check_batch(batch: &ArrayView2<'_, f64>, n_features: usize) -> Result<()> {
    if batch.ncols() != n_features {
        bail!(
            "X has {} features, but the model is expecting {} features as input",
            batch.ncols(),
            n_features
        );
    }
    Ok(())
}

/// Index of the largest value, first index on ties
pub fn argmax(row: ArrayView1<'_, f64>) -> usize {
    let mut best = 0;
    for (idx, &value) in row.iter().enumerate() {
        if value > row[best] {
            best = idx;
        }
    }
    best
}

/// Row-wise argmax of a probability matrix
pub fn argmax_rows(proba: &Array2<f64>) -> Vec<usize> {
    proba.rows().into_iter().map(argmax).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn test_argmax_prefers_first_on_ties() {
        assert_eq!(argmax(array![0.2, 0.5, 0.3].view()), 1);
        assert_eq!(argmax(array![0.4, 0.4, 0.2].view()), 0);
        assert_eq!(argmax(array![0.0, 0.5, 0.5].view()), 1);
    }

    #[test]
    fn test_argmax_rows() {
        let proba = array![[0.9, 0.1, 0.0], [0.1, 0.2, 0.7]];
        assert_eq!(argmax_rows(&proba), vec![0, 2]);
    }

    #[test]
    fn test_check_batch() {
        let batch = Array2::<f64>::zeros((1, 4));
        assert!(check_batch(&batch.view(), 4).is_ok());

        let err = check_batch(&batch.view(), 3).unwrap_err();
        assert!(err.to_string().contains("expecting 3 features"));
    }
}
