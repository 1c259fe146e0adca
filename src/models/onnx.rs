//! ONNX Runtime backed classifier
//!
//! ONNX graphs carry no estimator attributes, so the values reported by
//! `/info` come from a sidecar `<model>.meta.json` written at export time.

use crate::models::classifier::{argmax_rows, check_batch, Classifier};
use anyhow::{anyhow, ensure, Context, Result};
use ndarray::{Array2, ArrayView2};
use ort::memory::Allocator;
use ort::session::{builder::GraphOptimizationLevel, Session, SessionOutputs};
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, DynValue, Tensor};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// Estimator attributes exported next to an ONNX graph
#[derive(Debug, Clone, Deserialize)]
pub struct OnnxMetadata {
    pub model_type: String,
    pub n_estimators: usize,
    pub n_classes: usize,
    /// One score per input feature, in input order
    pub feature_importances: Vec<f64>,
}

impl OnnxMetadata {
    /// Sidecar path for a model: `iris.onnx` -> `iris.meta.json`
    pub fn path_for(model_path: &Path) -> PathBuf {
        model_path.with_extension("meta.json")
    }

    /// Load and validate a sidecar file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model metadata from {}", path.display()))?;
        let metadata: OnnxMetadata = serde_json::from_str(&json)
            .with_context(|| format!("Invalid model metadata in {}", path.display()))?;
        metadata.validate()?;
        Ok(metadata)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            !self.feature_importances.is_empty(),
            "Model metadata must list feature importances"
        );
        ensure!(self.n_classes > 0, "Model metadata must declare at least one class");
        ensure!(
            self.feature_importances
                .iter()
                .all(|i| i.is_finite() && *i >= 0.0),
            "Feature importances must be finite and non-negative"
        );
        Ok(())
    }
}

/// Classifier running an ONNX graph exported from a tree ensemble
pub struct OnnxClassifier {
    name: String,
    /// `Session::run` needs exclusive access
    session: Mutex<Session>,
    input_name: String,
    label_output: Option<String>,
    proba_output: String,
    metadata: OnnxMetadata,
}

impl OnnxClassifier {
    /// Load a graph and its sidecar metadata
    pub fn load<P: AsRef<Path>>(path: P, onnx_threads: usize) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string());

        let metadata = OnnxMetadata::from_file(OnnxMetadata::path_for(path))?;

        info!(model = %name, path = %path.display(), threads = onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(onnx_threads)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let label_output = session
            .outputs
            .iter()
            .find(|o| o.name.contains("label"))
            .map(|o| o.name.clone());

        let proba_output = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .or_else(|| session.outputs.last())
            .map(|o| o.name.clone())
            .ok_or_else(|| anyhow!("Model {} has no outputs", path.display()))?;

        info!(
            model = %name,
            input = %input_name,
            label_output = ?label_output,
            proba_output = %proba_output,
            "Model loaded successfully"
        );

        Ok(Self {
            name,
            session: Mutex::new(session),
            input_name,
            label_output,
            proba_output,
            metadata,
        })
    }

    /// Run the graph once, returning labels and probabilities
    fn run(&self, batch: ArrayView2<'_, f64>) -> Result<(Vec<usize>, Array2<f64>)> {
        check_batch(&batch, self.n_features())?;

        // Prepare input tensor - shape [n_samples, n_features]
        let shape = vec![batch.nrows() as i64, batch.ncols() as i64];
        let data: Vec<f32> = batch.iter().map(|&v| v as f32).collect();
        let input_tensor =
            Tensor::from_array((shape, data)).context("Failed to create input tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow!("Lock error: {}", e))?;
        let outputs = session.run(ort::inputs![&self.input_name => input_tensor])?;

        let proba = self.extract_probabilities(&outputs, batch.nrows())?;
        let labels = match &self.label_output {
            Some(name) => match outputs.get(name.as_str()) {
                Some(output) => extract_labels(output)?,
                None => argmax_rows(&proba),
            },
            None => argmax_rows(&proba),
        };

        debug!(model = %self.name, labels = ?labels, "ONNX inference complete");
        Ok((labels, proba))
    }

    /// Handles both plain tensor outputs and seq(map(int64, float)) ZipMap outputs
    fn extract_probabilities(&self, outputs: &SessionOutputs, n_rows: usize) -> Result<Array2<f64>> {
        let output = outputs
            .get(self.proba_output.as_str())
            .ok_or_else(|| anyhow!("Output {} missing from model result", self.proba_output))?;

        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            let dims: Vec<i64> = shape.iter().copied().collect();
            return proba_from_tensor(&dims, data, n_rows);
        }

        let dtype = output.dtype();
        if DynSequenceValueType::can_downcast(&dtype) {
            return self.extract_from_sequence_map(output, n_rows);
        }

        Err(anyhow!(
            "Unsupported probability output type for {}",
            self.proba_output
        ))
    }

    /// One map per sample, keyed by class index
    fn extract_from_sequence_map(&self, output: &DynValue, n_rows: usize) -> Result<Array2<f64>> {
        let allocator = Allocator::default();

        let sequence = output
            .downcast_ref::<DynSequenceValueType>()
            .map_err(|e| anyhow!("Failed to downcast to sequence: {}", e))?;
        let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;

        let rows = maps
            .iter()
            .map(|map_value| map_value.try_extract_key_values::<i64, f32>())
            .collect::<Result<Vec<_>, _>>()?;
        proba_from_maps(&rows, n_rows, self.metadata.n_classes)
    }
}

/// Probabilities from a dense `[n_rows, n_classes]` float tensor
fn proba_from_tensor(dims: &[i64], data: &[f32], n_rows: usize) -> Result<Array2<f64>> {
    ensure!(
        dims.len() == 2 && dims[0] >= 0 && dims[0] as usize == n_rows && dims[1] >= 0,
        "Unexpected probability tensor shape {:?}",
        dims
    );
    let proba: Vec<f64> = data.iter().map(|&p| p as f64).collect();
    Array2::from_shape_vec((n_rows, dims[1] as usize), proba)
        .context("Failed to shape probability tensor")
}

/// Probabilities from per-sample `(class index, probability)` pairs
fn proba_from_maps(rows: &[Vec<(i64, f32)>], n_rows: usize, n_classes: usize) -> Result<Array2<f64>> {
    ensure!(
        rows.len() == n_rows,
        "Expected {} probability maps, got {}",
        n_rows,
        rows.len()
    );

    let mut proba = Array2::<f64>::zeros((n_rows, n_classes));
    for (row, pairs) in rows.iter().enumerate() {
        for &(class_id, prob) in pairs {
            let class_id = usize::try_from(class_id)
                .ok()
                .filter(|c| *c < n_classes)
                .ok_or_else(|| anyhow!("Probability map has unknown class {}", class_id))?;
            proba[[row, class_id]] = prob as f64;
        }
    }

    Ok(proba)
}

fn extract_labels(output: &DynValue) -> Result<Vec<usize>> {
    let (_, data) = output
        .try_extract_tensor::<i64>()
        .context("Label output is not an int64 tensor")?;
    labels_from_i64(data)
}

fn labels_from_i64(data: &[i64]) -> Result<Vec<usize>> {
    data.iter()
        .map(|&label| {
            usize::try_from(label).map_err(|_| anyhow!("Model produced negative label {}", label))
        })
        .collect()
}

impl Classifier for OnnxClassifier {
    fn model_type(&self) -> &str {
        &self.metadata.model_type
    }

    fn n_features(&self) -> usize {
        self.metadata.feature_importances.len()
    }

    fn n_classes(&self) -> usize {
        self.metadata.n_classes
    }

    fn n_estimators(&self) -> usize {
        self.metadata.n_estimators
    }

    fn feature_importances(&self) -> &[f64] {
        &self.metadata.feature_importances
    }

    fn predict(&self, batch: ArrayView2<'_, f64>) -> Result<Vec<usize>> {
        self.run(batch).map(|(labels, _)| labels)
    }

    fn predict_proba(&self, batch: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        self.run(batch).map(|(_, proba)| proba)
    }

    fn predict_with_proba(&self, batch: ArrayView2<'_, f64>) -> Result<(Vec<usize>, Array2<f64>)> {
        self.run(batch)
    }
}
