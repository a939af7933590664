pub mod classifier;
#[cfg(feature = "onnx")]
pub mod onnx;
#[cfg(feature = "torch")]
pub mod torch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::pipeline::{InferenceError, OutputHead, PreprocessedBatch};

pub use classifier::{Classifier, Prediction};

#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error("Model file not found at {0}")]
    NotFound(PathBuf),
    #[error("Unsupported model format: {0}")]
    UnsupportedFormat(PathBuf),
    #[error("The {0} runtime is not compiled into this build")]
    RuntimeDisabled(&'static str),
    #[error("Model outputs {0} values per item, expected 1 (sigmoid) or 2 (softmax)")]
    UnsupportedOutput(usize),
    #[error("Runtime failed to load model: {0}")]
    Runtime(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelDescription {
    pub runtime: &'static str,
    pub input_shape: Vec<usize>,
    /// `None` when the runtime cannot tell before a forward pass.
    pub output_shape: Option<Vec<usize>>,
}

impl ModelDescription {
    pub fn output_arity(&self) -> Option<usize> {
        self.output_shape.as_ref().and_then(|s| s.last().copied())
    }
}

/// A loaded scoring model. Implementations serialize internally if the runtime is not reentrant.
pub trait ScoringModel: Send + Sync {
    /// Raw scores for the single batch item, flattened.
    fn forward(&self, batch: &PreprocessedBatch) -> Result<Vec<f32>, InferenceError>;

    fn describe(&self) -> ModelDescription;
}

pub struct LoadedModel {
    model: Arc<dyn ScoringModel>,
    head: OutputHead,
    description: ModelDescription,
}

impl LoadedModel {
    pub fn head(&self) -> OutputHead {
        self.head
    }

    pub fn description(&self) -> &ModelDescription {
        &self.description
    }

    pub fn score(&self, batch: &PreprocessedBatch) -> Result<Vec<f32>, InferenceError> {
        self.model.forward(batch)
    }
}

/// Either a real model or demo mode. Built once at startup, read-only afterwards.
pub enum ModelHandle {
    Loaded(LoadedModel),
    Absent,
}

impl ModelHandle {
    /// Binds a model and fixes its output head from the advertised output shape.
    pub fn loaded(model: Arc<dyn ScoringModel>) -> Result<Self, ModelLoadError> {
        let description = model.describe();
        let head = match description.output_arity() {
            Some(arity) => {
                OutputHead::from_arity(arity).ok_or(ModelLoadError::UnsupportedOutput(arity))?
            }
            None => OutputHead::Dynamic,
        };
        Ok(ModelHandle::Loaded(LoadedModel {
            model,
            head,
            description,
        }))
    }

    /// Loads the artifact at `path`; any failure leaves the service in demo mode.
    pub fn open(path: &Path, input_size: u32) -> Self {
        match load_model(path, input_size).and_then(ModelHandle::loaded) {
            Ok(handle) => {
                if let ModelHandle::Loaded(loaded) = &handle {
                    log::info!(
                        "Model loaded from {} ({}, input {:?}, output {:?}, {} head)",
                        path.display(),
                        loaded.description.runtime,
                        loaded.description.input_shape,
                        loaded.description.output_shape,
                        loaded.head
                    );
                }
                handle
            }
            Err(ModelLoadError::NotFound(path)) => {
                log::warn!(
                    "Model file not found at {}, running in demo mode",
                    path.display()
                );
                ModelHandle::Absent
            }
            Err(e) => {
                log::error!("Error loading model: {}. Running in demo mode", e);
                ModelHandle::Absent
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, ModelHandle::Loaded(_))
    }
}

/// Picks a runtime from the file extension.
pub fn load_model(path: &Path, input_size: u32) -> Result<Arc<dyn ScoringModel>, ModelLoadError> {
    if !path.is_file() {
        return Err(ModelLoadError::NotFound(path.to_path_buf()));
    }
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("onnx") => load_onnx(path, input_size),
        Some("pt") | Some("ts") | Some("torchscript") => load_torch(path, input_size),
        _ => Err(ModelLoadError::UnsupportedFormat(path.to_path_buf())),
    }
}

#[cfg(feature = "onnx")]
fn load_onnx(path: &Path, input_size: u32) -> Result<Arc<dyn ScoringModel>, ModelLoadError> {
    Ok(Arc::new(onnx::OnnxModel::load(path, input_size)?))
}

#[cfg(not(feature = "onnx"))]
fn load_onnx(_path: &Path, _input_size: u32) -> Result<Arc<dyn ScoringModel>, ModelLoadError> {
    Err(ModelLoadError::RuntimeDisabled("onnx"))
}

#[cfg(feature = "torch")]
fn load_torch(path: &Path, input_size: u32) -> Result<Arc<dyn ScoringModel>, ModelLoadError> {
    Ok(Arc::new(torch::TorchModel::load(path, input_size)?))
}

#[cfg(not(feature = "torch"))]
fn load_torch(_path: &Path, _input_size: u32) -> Result<Arc<dyn ScoringModel>, ModelLoadError> {
    Err(ModelLoadError::RuntimeDisabled("torch"))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Shaped(Option<Vec<usize>>);

    impl ScoringModel for Shaped {
        fn forward(&self, _batch: &PreprocessedBatch) -> Result<Vec<f32>, InferenceError> {
            Ok(vec![0.5])
        }

        fn describe(&self) -> ModelDescription {
            ModelDescription {
                runtime: "test",
                input_shape: vec![1, 128, 128, 3],
                output_shape: self.0.clone(),
            }
        }
    }

    fn head_of(handle: ModelHandle) -> OutputHead {
        match handle {
            ModelHandle::Loaded(loaded) => loaded.head(),
            ModelHandle::Absent => panic!("expected a loaded model"),
        }
    }

    #[test]
    fn head_is_resolved_from_output_shape() {
        let sigmoid = ModelHandle::loaded(Arc::new(Shaped(Some(vec![1, 1])))).unwrap();
        assert_eq!(head_of(sigmoid), OutputHead::Sigmoid);

        let softmax = ModelHandle::loaded(Arc::new(Shaped(Some(vec![1, 2])))).unwrap();
        assert_eq!(head_of(softmax), OutputHead::Softmax);

        let unknown = ModelHandle::loaded(Arc::new(Shaped(None))).unwrap();
        assert_eq!(head_of(unknown), OutputHead::Dynamic);
    }

    #[test]
    fn wide_output_is_refused_at_load() {
        assert!(matches!(
            ModelHandle::loaded(Arc::new(Shaped(Some(vec![1, 10])))),
            Err(ModelLoadError::UnsupportedOutput(10))
        ));
    }

    #[test]
    fn missing_artifact_means_demo_mode() {
        let path = std::env::temp_dir().join("quality-service-missing-model.onnx");
        assert!(matches!(
            load_model(&path, 128),
            Err(ModelLoadError::NotFound(_))
        ));
        assert!(!ModelHandle::open(&path, 128).is_loaded());
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let path = std::env::temp_dir().join(format!(
            "quality-service-model-{}.h5",
            std::process::id()
        ));
        std::fs::write(&path, b"not a model").unwrap();
        let result = load_model(&path, 128);
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(ModelLoadError::UnsupportedFormat(_))));
    }

    #[cfg(feature = "onnx")]
    #[test]
    fn corrupt_onnx_file_falls_back_to_demo_mode() {
        let path = std::env::temp_dir().join(format!(
            "quality-service-corrupt-{}.onnx",
            std::process::id()
        ));
        std::fs::write(&path, b"\x00\x01garbage").unwrap();
        let handle = ModelHandle::open(&path, 128);
        std::fs::remove_file(&path).ok();
        assert!(!handle.is_loaded());
    }
}
