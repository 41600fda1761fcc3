//! Model Provider
//!
//! Resolves the lung tissue classifier on first use:
//! - Fetches the ONNX artifact from its remote (or local) source
//! - Persists it to local storage
//! - Deserializes it into a runnable tract plan
//! - Caches the resulting handle for the lifetime of the process

mod handle;
mod loader;
mod provider;
mod source;

pub use handle::ModelHandle;
pub use loader::{Classifier, ForwardError, MockClassifier, MockModelLoader, ModelLoader, OnnxModelLoader};
pub use provider::ModelProvider;
pub use source::{
    ArtifactSource, HttpArtifactSource, LocalArtifactSource, MemoryArtifactSource,
    ModelSourceConfig,
};

use std::path::PathBuf;
use thiserror::Error;

/// Errors while acquiring the model on first use
#[derive(Debug, Error)]
pub enum ModelAcquisitionError {
    #[error("Failed to fetch model from {url}: {reason}")]
    Fetch { url: String, reason: String },
    #[error("Model source {url} answered with HTTP {status}")]
    HttpStatus { url: String, status: u16 },
    #[error("Model artifact is empty")]
    EmptyArtifact,
    #[error("Failed to store model artifact at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to deserialize model: {0}")]
    Deserialize(String),
    #[error("Model loader panicked")]
    LoaderPanicked,
    #[error("Invalid model source configuration: {0}")]
    Config(String),
}
