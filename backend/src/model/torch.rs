use std::path::Path;
use std::sync::Mutex;

use tch::{CModule, Device, Kind, Tensor};

use super::{ModelDescription, ModelLoadError, ScoringModel};
use crate::pipeline::{InferenceError, PreprocessedBatch};

/// TorchScript module. Forward calls are serialized through the mutex.
pub struct TorchModel {
    module: Mutex<CModule>,
    device: Device,
    input_shape: Vec<usize>,
}

impl TorchModel {
    pub fn load(path: &Path, input_size: u32) -> Result<Self, ModelLoadError> {
        let device = Device::cuda_if_available();
        let module = CModule::load_on_device(path, device)
            .map_err(|e| ModelLoadError::Runtime(e.to_string()))?;
        log::info!("TorchScript module placed on {:?}", device);
        let side = input_size as usize;
        Ok(Self {
            module: Mutex::new(module),
            device,
            input_shape: vec![1, side, side, 3],
        })
    }
}

impl ScoringModel for TorchModel {
    fn forward(&self, batch: &PreprocessedBatch) -> Result<Vec<f32>, InferenceError> {
        let dims: Vec<i64> = batch.shape().iter().map(|&d| d as i64).collect();
        let input = Tensor::from_slice(&batch.to_vec())
            .f_view(dims.as_slice())
            .map_err(runtime)?
            .to_device(self.device);

        let output = {
            let module = self
                .module
                .lock()
                .map_err(|_| InferenceError::Runtime("model lock poisoned".to_string()))?;
            module.forward_ts(&[input]).map_err(runtime)?
        };

        let output_flat = output
            .to_device(Device::Cpu)
            .to_kind(Kind::Float)
            .f_reshape([-1])
            .map_err(runtime)?;
        let num_elements = output_flat.size()[0] as usize;
        let mut output_vec = vec![0.0f32; num_elements];
        output_flat
            .f_copy_data(&mut output_vec, num_elements)
            .map_err(runtime)?;
        Ok(output_vec)
    }

    fn describe(&self) -> ModelDescription {
        ModelDescription {
            runtime: "torch",
            input_shape: self.input_shape.clone(),
            output_shape: None,
        }
    }
}

fn runtime(e: tch::TchError) -> InferenceError {
    InferenceError::Runtime(e.to_string())
}
