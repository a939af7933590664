use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, web};
use quality_service::config::ServiceConfig;
use quality_service::model::{Classifier, ModelHandle};
use quality_service::pipeline::ClassLabelMap;
use quality_service::routes::{AppState, configure_routes};
use std::env;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = ServiceConfig::load().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;
    log::info!("Configuration: {:?}", config);

    let labels = ClassLabelMap::load_or_default(&config.label_map_path).map_err(|e| {
        log::error!(
            "Failed to load label map from {}: {}",
            config.label_map_path.display(),
            e
        );
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;

    let handle = ModelHandle::open(&config.model_path, config.image_size);
    if handle.is_loaded() {
        log::info!("Model ready for predictions");
    } else {
        log::warn!("Running in demo mode - predictions are random and flagged demo_mode=true");
    }

    let classifier = Classifier::new(handle, labels, config.image_size);
    let state = web::Data::new(AppState::new(classifier, &config));
    let bind_address = config.bind_address();

    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::AUTHORIZATION,
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .configure(|cfg| configure_routes(cfg, state.clone()))
    })
    .bind(&bind_address)?
    .run()
    .await
}
