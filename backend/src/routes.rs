use std::sync::Arc;
use std::time::Instant;

use actix_multipart::Multipart;
use actix_web::error::JsonPayloadError;
use actix_web::{HttpResponse, web};
use futures::TryStreamExt;
use shared::{
    DemoModeResponse, Endpoints, HealthResponse, ModelInfoResponse, PredictRequest,
    PredictionResponse, ServiceDescriptor,
};

use crate::config::ServiceConfig;
use crate::error::ApiError;
use crate::model::{Classifier, ModelHandle, Prediction};
use crate::pipeline::decode::check_content_type;
use crate::pipeline::{RawImageInput, preprocess};

/// Read-only state shared by every request.
pub struct AppState {
    pub classifier: Arc<Classifier>,
    pub model_path: String,
    pub max_payload_bytes: usize,
}

impl AppState {
    pub fn new(classifier: Classifier, config: &ServiceConfig) -> Self {
        Self {
            classifier: Arc::new(classifier),
            model_path: config.model_path.display().to_string(),
            max_payload_bytes: config.max_payload_bytes,
        }
    }
}

/// Registers the shared state and every route. Both transports take their size limit from
/// `state.max_payload_bytes`.
pub fn configure_routes(cfg: &mut web::ServiceConfig, state: web::Data<AppState>) {
    let max_payload_bytes = state.max_payload_bytes;
    let json_config = web::JsonConfig::default()
        .limit(max_payload_bytes)
        .error_handler(move |err, _req| match err {
            JsonPayloadError::Overflow { .. } | JsonPayloadError::OverflowKnownLength { .. } => {
                ApiError::PayloadTooLarge(max_payload_bytes).into()
            }
            other => ApiError::InvalidJson(other.to_string()).into(),
        });

    cfg.app_data(state)
        .app_data(json_config)
        .service(web::resource("/").route(web::get().to(root)))
        .service(web::resource("/health").route(web::get().to(health)))
        .service(web::resource("/model-info").route(web::get().to(model_info)))
        .service(web::resource("/predict").route(web::post().to(predict)))
        .service(web::resource("/predict-file").route(web::post().to(predict_file)));
}

async fn root(state: web::Data<AppState>) -> HttpResponse {
    let classifier = &state.classifier;
    let model_loaded = classifier.handle().is_loaded();
    let size = classifier.input_size();
    HttpResponse::Ok().json(ServiceDescriptor {
        message: "Fruit Quality Classifier API".to_string(),
        status: "online".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_loaded,
        demo_mode: !model_loaded,
        expected_input_size: format!("{}x{}", size, size),
        endpoints: Endpoints {
            health: "/health".to_string(),
            model_info: "/model-info".to_string(),
            predict: "/predict (POST)".to_string(),
            predict_file: "/predict-file (POST)".to_string(),
        },
        class_names: classifier.labels().names(),
    })
}

async fn health(state: web::Data<AppState>) -> HttpResponse {
    let handle = state.classifier.handle();
    let runtime = match handle {
        ModelHandle::Loaded(model) => model.description().runtime,
        ModelHandle::Absent => "demo",
    };
    let now = chrono::Utc::now();
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        model_loaded: handle.is_loaded(),
        model_path: state.model_path.clone(),
        expected_input_size: state.classifier.input_size(),
        runtime: runtime.to_string(),
        demo_mode: !handle.is_loaded(),
        timestamp: now.timestamp_micros() as f64 / 1_000_000.0,
    })
}

async fn model_info(state: web::Data<AppState>) -> HttpResponse {
    match state.classifier.handle() {
        ModelHandle::Loaded(model) => {
            let description = model.description();
            HttpResponse::Ok().json(ModelInfoResponse {
                runtime: description.runtime.to_string(),
                input_shape: description.input_shape.clone(),
                output_shape: description.output_shape.clone(),
                output_head: model.head().to_string(),
                class_names: state.classifier.labels().names(),
            })
        }
        ModelHandle::Absent => HttpResponse::ServiceUnavailable().json(DemoModeResponse {
            status: "demo_mode".to_string(),
            message: "No model loaded - running in demo mode".to_string(),
            instructions: format!(
                "Place a model at {} (or set MODEL_PATH) and restart to enable real predictions",
                state.model_path
            ),
        }),
    }
}

async fn predict(
    state: web::Data<AppState>,
    body: web::Json<PredictRequest>,
) -> Result<HttpResponse, ApiError> {
    let started = Instant::now();
    let input = RawImageInput::Encoded(body.into_inner().image);
    let prediction = run_pipeline(state.classifier.clone(), input).await?;
    Ok(respond(prediction, started))
}

async fn predict_file(
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let started = Instant::now();
    let input = read_upload(&mut payload, state.max_payload_bytes).await?;
    let prediction = run_pipeline(state.classifier.clone(), input).await?;
    Ok(respond(prediction, started))
}

/// Finds the `file` (or `image`) field, checking its content type before reading any bytes.
async fn read_upload(payload: &mut Multipart, limit: usize) -> Result<RawImageInput, ApiError> {
    while let Some(mut field) = payload.try_next().await? {
        if !matches!(field.name(), Some("file") | Some("image")) {
            while field.try_next().await?.is_some() {}
            continue;
        }

        let content_type = field.content_type().map(|m| m.essence_str().to_string());
        check_content_type(content_type.as_deref())?;

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            if bytes.len() + chunk.len() > limit {
                return Err(ApiError::PayloadTooLarge(limit));
            }
            bytes.extend_from_slice(&chunk);
        }
        return Ok(RawImageInput::Upload {
            bytes,
            content_type,
        });
    }
    Err(ApiError::MissingFile)
}

/// Decode, preprocess and score on the blocking pool.
async fn run_pipeline(
    classifier: Arc<Classifier>,
    input: RawImageInput,
) -> Result<Prediction, ApiError> {
    web::block(move || -> Result<Prediction, ApiError> {
        let image = input.decode()?;
        let batch = preprocess(&image, classifier.input_size());
        Ok(classifier.classify(&batch)?)
    })
    .await?
}

fn respond(prediction: Prediction, started: Instant) -> HttpResponse {
    let processing_time = started.elapsed().as_secs_f64();
    log::info!(
        "Predicted {} ({:.3}) in {:.3}s{}",
        prediction.result.label,
        prediction.result.confidence,
        processing_time,
        if prediction.demo_mode { " [demo]" } else { "" }
    );
    HttpResponse::Ok().json(PredictionResponse {
        result: prediction.result.label,
        confidence: prediction.result.confidence,
        processing_time,
        demo_mode: prediction.demo_mode,
    })
}
