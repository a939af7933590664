use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PredictRequest {
    /// Base64 image, optionally prefixed with a `data:image/...;base64,` header.
    pub image: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PredictionResponse {
    pub result: String,
    pub confidence: f32,
    pub processing_time: f64,
    pub demo_mode: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub model_path: String,
    pub expected_input_size: u32,
    pub runtime: String,
    pub demo_mode: bool,
    pub timestamp: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Endpoints {
    pub health: String,
    pub model_info: String,
    pub predict: String,
    pub predict_file: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ServiceDescriptor {
    pub message: String,
    pub status: String,
    pub version: String,
    pub model_loaded: bool,
    pub demo_mode: bool,
    pub expected_input_size: String,
    pub endpoints: Endpoints,
    pub class_names: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ModelInfoResponse {
    pub runtime: String,
    pub input_shape: Vec<usize>,
    pub output_shape: Option<Vec<usize>>,
    pub output_head: String,
    pub class_names: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DemoModeResponse {
    pub status: String,
    pub message: String,
    pub instructions: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ErrorResponse {
    pub error: String,
}
