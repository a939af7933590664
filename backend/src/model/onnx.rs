use std::path::Path;

use tract_onnx::prelude::*;

use super::{ModelDescription, ModelLoadError, ScoringModel};
use crate::pipeline::{InferenceError, PreprocessedBatch};

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// ONNX graph optimised for a fixed `[1, S, S, 3]` f32 input. `run` takes `&self`, so no lock.
pub struct OnnxModel {
    plan: Plan,
    input_shape: Vec<usize>,
    output_shape: Option<Vec<usize>>,
}

impl OnnxModel {
    pub fn load(path: &Path, input_size: u32) -> Result<Self, ModelLoadError> {
        let side = input_size as usize;
        let input_shape = vec![1, side, side, 3];

        let model = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|m| {
                m.with_input_fact(
                    0,
                    InferenceFact::dt_shape(f32::datum_type(), tvec!(1, side, side, 3)),
                )
            })
            .and_then(|m| m.into_optimized())
            .map_err(runtime_error)?;

        let output_shape = model
            .output_fact(0)
            .map_err(runtime_error)?
            .shape
            .as_concrete()
            .map(|dims| dims.to_vec());
        let plan = model.into_runnable().map_err(runtime_error)?;

        Ok(Self {
            plan,
            input_shape,
            output_shape,
        })
    }
}

impl ScoringModel for OnnxModel {
    fn forward(&self, batch: &PreprocessedBatch) -> Result<Vec<f32>, InferenceError> {
        let shape = batch.shape();
        if shape[..] != self.input_shape[..] {
            return Err(InferenceError::Runtime(format!(
                "batch shape {:?} does not match model input {:?}",
                shape, self.input_shape
            )));
        }
        let input = Tensor::from_shape(&shape, &batch.to_vec()).map_err(inference_error)?;
        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(inference_error)?;
        let first = outputs
            .first()
            .ok_or_else(|| InferenceError::Runtime("model returned no outputs".to_string()))?;
        let scores = first.cast_to::<f32>().map_err(inference_error)?;
        let values = scores.as_slice::<f32>().map_err(inference_error)?;
        Ok(values.to_vec())
    }

    fn describe(&self) -> ModelDescription {
        ModelDescription {
            runtime: "onnx",
            input_shape: self.input_shape.clone(),
            output_shape: self.output_shape.clone(),
        }
    }
}

fn runtime_error(e: TractError) -> ModelLoadError {
    ModelLoadError::Runtime(format!("{:#}", e))
}

fn inference_error(e: TractError) -> InferenceError {
    InferenceError::Runtime(format!("{:#}", e))
}
