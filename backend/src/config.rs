use serde::Deserialize;
use std::env;
use std::path::PathBuf;

const DEFAULT_MAX_PAYLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub model_path: PathBuf,
    pub label_map_path: PathBuf,
    pub image_size: u32,
    pub max_payload_bytes: usize,
}

/// On-disk layer; every key may be omitted.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    host: Option<String>,
    port: Option<u16>,
    model_path: Option<PathBuf>,
    label_map_path: Option<PathBuf>,
    image_size: Option<u32>,
    max_payload_bytes: Option<usize>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            model_path: PathBuf::from("./model/fruit_classifier.onnx"),
            label_map_path: PathBuf::from("./model/class_names.json"),
            image_size: 128,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }
}

impl ServiceConfig {
    /// Defaults, then the YAML file named by `SERVICE_CONFIG`, then environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Ok(path) = env::var("SERVICE_CONFIG") {
            let path = PathBuf::from(path);
            let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            config.apply_yaml(&contents)?;
        }
        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn apply_yaml(&mut self, contents: &str) -> Result<(), ConfigError> {
        let file: FileConfig = serde_yaml::from_str(contents)?;
        if let Some(host) = file.host {
            self.host = host;
        }
        if let Some(port) = file.port {
            self.port = port;
        }
        if let Some(model_path) = file.model_path {
            self.model_path = model_path;
        }
        if let Some(label_map_path) = file.label_map_path {
            self.label_map_path = label_map_path;
        }
        if let Some(image_size) = file.image_size {
            self.image_size = image_size;
        }
        if let Some(max_payload_bytes) = file.max_payload_bytes {
            self.max_payload_bytes = max_payload_bytes;
        }
        Ok(())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.port = parse_value("PORT", port)?;
        }
        if let Some(model_path) = lookup("MODEL_PATH") {
            self.model_path = PathBuf::from(model_path);
        }
        if let Some(label_map_path) = lookup("LABEL_MAP_PATH") {
            self.label_map_path = PathBuf::from(label_map_path);
        }
        if let Some(image_size) = lookup("IMAGE_SIZE") {
            self.image_size = parse_value("IMAGE_SIZE", image_size)?;
        }
        if let Some(max_payload_bytes) = lookup("MAX_PAYLOAD_BYTES") {
            self.max_payload_bytes = parse_value("MAX_PAYLOAD_BYTES", max_payload_bytes)?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.image_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "image_size",
                value: "0".to_string(),
            });
        }
        if self.max_payload_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_payload_bytes",
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { key, value })
}
