//! Model artifact sources

use crate::ModelAcquisitionError;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Default location of the ONNX export of the ConvNeXt lung classifier
pub const DEFAULT_MODEL_URL: &str =
    "https://huggingface.co/felixhrdyn/convnextv1-lung-cancer/resolve/main/convnext_lung_82.onnx";

/// Default local file the artifact is written to
pub const DEFAULT_ARTIFACT_PATH: &str = "convnext_lung_82.onnx";

/// Where and how to fetch the model artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSourceConfig {
    /// Remote URL (`http(s)://`) or local file (`file://`) of the artifact
    pub url: String,
    /// Local path the fetched artifact is written to
    pub local_path: PathBuf,
    /// TCP connect timeout (seconds)
    pub connect_timeout_secs: u64,
    /// Whole-request timeout (seconds); unbounded when unset
    pub request_timeout_secs: Option<u64>,
}

impl Default for ModelSourceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_MODEL_URL.to_string(),
            local_path: PathBuf::from(DEFAULT_ARTIFACT_PATH),
            connect_timeout_secs: 10,
            request_timeout_secs: None,
        }
    }
}

impl ModelSourceConfig {
    /// Use an artifact already present on disk (offline deployments)
    pub fn local(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            url: format!("file://{}", path.display()),
            ..Default::default()
        }
    }

    /// Build the artifact source this configuration points at
    pub fn build_source(&self) -> Result<Box<dyn ArtifactSource>, ModelAcquisitionError> {
        if let Some(path) = self.url.strip_prefix("file://") {
            Ok(Box::new(LocalArtifactSource::new(path)))
        } else if self.url.starts_with("http://") || self.url.starts_with("https://") {
            Ok(Box::new(HttpArtifactSource::new(self)?))
        } else {
            Err(ModelAcquisitionError::Config(format!(
                "unsupported model URL scheme: {}",
                self.url
            )))
        }
    }
}

/// Source of the serialized model bytes
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Fetch the complete artifact
    async fn fetch(&self) -> Result<Bytes, ModelAcquisitionError>;

    /// Human readable location for logging
    fn location(&self) -> &str;
}

/// Fetches the artifact over HTTP(S)
pub struct HttpArtifactSource {
    client: reqwest::Client,
    url: String,
}

impl HttpArtifactSource {
    /// Create a new HTTP source
    pub fn new(config: &ModelSourceConfig) -> Result<Self, ModelAcquisitionError> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs));
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| ModelAcquisitionError::Config(e.to_string()))?;

        info!("Creating HTTP artifact source: {}", config.url);
        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl ArtifactSource for HttpArtifactSource {
    async fn fetch(&self) -> Result<Bytes, ModelAcquisitionError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| ModelAcquisitionError::Fetch {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ModelAcquisitionError::HttpStatus {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ModelAcquisitionError::Fetch {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;
        debug!("Fetched {} bytes from {}", body.len(), self.url);
        Ok(body)
    }

    fn location(&self) -> &str {
        &self.url
    }
}

/// Reads the artifact from a file on disk
pub struct LocalArtifactSource {
    path: PathBuf,
    location: String,
}

impl LocalArtifactSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let location = path.display().to_string();
        Self { path, location }
    }
}

#[async_trait]
impl ArtifactSource for LocalArtifactSource {
    async fn fetch(&self) -> Result<Bytes, ModelAcquisitionError> {
        let data = tokio::fs::read(&self.path)
            .await
            .map_err(|e| ModelAcquisitionError::Fetch {
                url: self.location.clone(),
                reason: e.to_string(),
            })?;
        Ok(Bytes::from(data))
    }

    fn location(&self) -> &str {
        &self.location
    }
}

/// Serves an artifact held in memory
pub struct MemoryArtifactSource {
    bytes: Bytes,
}

impl MemoryArtifactSource {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

#[async_trait]
impl ArtifactSource for MemoryArtifactSource {
    async fn fetch(&self) -> Result<Bytes, ModelAcquisitionError> {
        Ok(self.bytes.clone())
    }

    fn location(&self) -> &str {
        "memory"
    }
}
