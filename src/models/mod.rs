//! ML model inference components

pub mod classifier;
pub mod forest;
pub mod inference;
pub mod loader;
pub mod onnx;

pub use classifier::Classifier;
pub use forest::ForestModel;
pub use inference::{InferenceEngine, Prediction};
pub use loader::ModelLoader;
pub use onnx::OnnxClassifier;
