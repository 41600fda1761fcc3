//! Application configuration
//!
//! Layered: built-in defaults, then an optional `lung-classifier.{toml,yaml,json}`
//! file, then `LUNG_CLASSIFIER_*` environment variables (`__` separates
//! nested keys, e.g. `LUNG_CLASSIFIER_MODEL__URL`).

use crate::rate_limit::RateLimitConfig;
use config::{Config, ConfigError, Environment, File};
use image_preprocessor::PreprocessConfig;
use inference_engine::EngineConfig;
use model_provider::ModelSourceConfig;
use serde::{Deserialize, Serialize};

/// Default config file stem
pub const DEFAULT_CONFIG_FILE: &str = "lung-classifier";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "LUNG_CLASSIFIER";

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind_addr: String,
    /// Max log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit JSON log lines
    pub json_logs: bool,
    /// Maximum accepted upload size (bytes)
    pub max_upload_bytes: usize,
    /// Maximum number of live sessions
    pub max_sessions: usize,
    /// Start acquiring the model at startup instead of on first submission
    pub preload_model: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            max_upload_bytes: 20 * 1024 * 1024,
            max_sessions: 1024,
            preload_model: false,
        }
    }
}

/// Full application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelSourceConfig,
    pub preprocess: PreprocessConfig,
    pub engine: EngineConfig,
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    /// Load configuration from the default file stem and the environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load configuration from a given file stem (optional) and the environment
    pub fn load_from(file_stem: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::with_name(file_stem).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
