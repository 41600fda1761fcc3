//! Model Provider Implementation

use crate::{
    ArtifactSource, Classifier, ModelAcquisitionError, ModelHandle, ModelLoader, ModelSourceConfig,
    OnnxModelLoader,
};
use chrono::Utc;
use image_preprocessor::INPUT_SHAPE;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{error, info};

/// Resolves the classifier once per process and hands out shared handles.
///
/// Concurrent callers during a cold start wait for the single in-flight
/// acquisition. A failed acquisition caches nothing, so the next caller
/// starts a fresh attempt.
pub struct ModelProvider {
    source: Arc<dyn ArtifactSource>,
    loader: Arc<dyn ModelLoader>,
    artifact_path: PathBuf,
    input_shape: [usize; 4],
    model: OnceCell<ModelHandle>,
    attempts: AtomicU64,
}

impl ModelProvider {
    /// Create a provider over an explicit source and loader
    pub fn new(
        source: Arc<dyn ArtifactSource>,
        loader: Arc<dyn ModelLoader>,
        artifact_path: impl Into<PathBuf>,
    ) -> Self {
        let artifact_path = artifact_path.into();
        info!(
            "Creating model provider: source={}, artifact={}",
            source.location(),
            artifact_path.display()
        );
        Self {
            source,
            loader,
            artifact_path,
            input_shape: INPUT_SHAPE,
            model: OnceCell::new(),
            attempts: AtomicU64::new(0),
        }
    }

    /// Create the production provider (HTTP or file source, tract ONNX loader)
    pub fn from_config(config: &ModelSourceConfig) -> Result<Self, ModelAcquisitionError> {
        let source: Arc<dyn ArtifactSource> = Arc::from(config.build_source()?);
        Ok(Self::new(
            source,
            Arc::new(OnnxModelLoader::default()),
            config.local_path.clone(),
        ))
    }

    /// Get the loaded model, acquiring it on first use
    pub async fn get_model(&self) -> Result<ModelHandle, ModelAcquisitionError> {
        self.model
            .get_or_try_init(|| self.acquire())
            .await
            .cloned()
    }

    /// Peek at the model without triggering acquisition
    pub fn loaded(&self) -> Option<ModelHandle> {
        self.model.get().cloned()
    }

    /// Check if the model has been loaded
    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    /// Number of acquisition attempts started so far
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Local path of the persisted artifact
    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }

    async fn acquire(&self) -> Result<ModelHandle, ModelAcquisitionError> {
        let attempt = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            "Acquiring model from {} (attempt {})",
            self.source.location(),
            attempt
        );
        let start = Instant::now();

        match self.fetch_and_load().await {
            Ok(classifier) => {
                let handle = ModelHandle::new(
                    classifier,
                    self.source.location(),
                    Utc::now(),
                    start.elapsed(),
                    self.input_shape,
                );
                info!(
                    "Model loaded in {:.2}s via {}",
                    handle.load_duration_secs(),
                    handle.runtime()
                );
                metrics::counter!("model_loads_total").increment(1);
                metrics::gauge!("model_load_seconds").set(handle.load_duration_secs());
                Ok(handle)
            }
            Err(e) => {
                error!("Model acquisition failed: {}", e);
                metrics::counter!("model_acquisition_failures_total").increment(1);
                Err(e)
            }
        }
    }

    async fn fetch_and_load(&self) -> Result<Arc<dyn Classifier>, ModelAcquisitionError> {
        let bytes = self.source.fetch().await?;
        if bytes.is_empty() {
            return Err(ModelAcquisitionError::EmptyArtifact);
        }

        self.store_artifact(&bytes).await?;

        let loader = Arc::clone(&self.loader);
        let path = self.artifact_path.clone();
        tokio::task::spawn_blocking(move || loader.load(&path))
            .await
            .map_err(|_| ModelAcquisitionError::LoaderPanicked)?
    }

    async fn store_artifact(&self, bytes: &[u8]) -> Result<(), ModelAcquisitionError> {
        let storage_err = |source: std::io::Error| ModelAcquisitionError::Storage {
            path: self.artifact_path.clone(),
            source,
        };

        if let Some(parent) = self.artifact_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(storage_err)?;
            }
        }
        tokio::fs::write(&self.artifact_path, bytes)
            .await
            .map_err(storage_err)?;
        info!(
            "Stored {} byte artifact at {}",
            bytes.len(),
            self.artifact_path.display()
        );
        Ok(())
    }
}
