//! Model artifact loader

use crate::models::classifier::Classifier;
use crate::models::forest::ForestModel;
use crate::models::onnx::OnnxClassifier;
use anyhow::{bail, Result};
use std::path::Path;
use tracing::info;

/// Loader for serialized classifiers.
///
/// The runtime is picked from the file extension: `.json` tree ensembles run
/// natively, `.onnx` graphs run through ONNX Runtime.
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with default settings (1 thread)
    pub fn new() -> Self {
        Self::with_threads(1)
    }

    /// Create a new model loader with specified number of ONNX threads
    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
        }
    }

    /// Load a classifier from file
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Box<dyn Classifier>> {
        let path = path.as_ref();

        if !path.is_file() {
            bail!("Model file not found: {}", path.display());
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        let model: Box<dyn Classifier> = match extension.as_deref() {
            Some("json") => Box::new(ForestModel::from_file(path)?),
            Some("onnx") => Box::new(OnnxClassifier::load(path, self.onnx_threads)?),
            _ => bail!(
                "Unsupported model format for {} (expected .json or .onnx)",
                path.display()
            ),
        };

        info!(
            path = %path.display(),
            model_type = %model.model_type(),
            n_estimators = model.n_estimators(),
            n_features = model.n_features(),
            n_classes = model.n_classes(),
            "Model loaded"
        );

        Ok(model)
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::forest::IRIS_FOREST_JSON;

    #[test]
    fn test_load_shipped_artifact() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("models/iris_forest.json");
        let model = ModelLoader::new().load(path).unwrap();

        assert_eq!(model.model_type(), "RandomForestClassifier");
        assert_eq!(model.n_estimators(), 3);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = ModelLoader::new()
            .load("definitely/not/here.json")
            .err()
            .unwrap();
        assert!(err.to_string().contains("Model file not found"));
    }

    #[test]
    fn test_unknown_extension_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("iris_model.pkl");
        std::fs::write(&path, IRIS_FOREST_JSON).unwrap();

        let err = ModelLoader::new().load(&path).err().unwrap();
        assert!(err.to_string().contains("Unsupported model format"));
    }

    #[test]
    fn test_corrupt_artifact_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, r#"{"n_features": 4, "n_classes": 3, "trees": []}"#).unwrap();

        let err = ModelLoader::new().load(&path).err().unwrap();
        assert!(format!("{err:#}").contains("no estimators"));
    }

    #[test]
    fn test_extension_match_ignores_case() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("IRIS.JSON");
        std::fs::write(&path, IRIS_FOREST_JSON).unwrap();

        assert!(ModelLoader::with_threads(0).load(&path).is_ok());
    }
}
