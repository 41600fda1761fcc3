//! Loaded model handle

use crate::loader::{Classifier, ForwardError, MockClassifier};
use chrono::{DateTime, Utc};
use image_preprocessor::{ImageTensor, INPUT_SHAPE};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

struct LoadedModel {
    classifier: Arc<dyn Classifier>,
    loaded_at: DateTime<Utc>,
    load_duration: Duration,
    source: String,
    input_shape: [usize; 4],
}

/// Shared, read-only handle on the loaded classifier
#[derive(Clone)]
pub struct ModelHandle {
    inner: Arc<LoadedModel>,
}

impl ModelHandle {
    /// Wrap a freshly loaded classifier
    pub fn new(
        classifier: Arc<dyn Classifier>,
        source: impl Into<String>,
        loaded_at: DateTime<Utc>,
        load_duration: Duration,
        input_shape: [usize; 4],
    ) -> Self {
        Self {
            inner: Arc::new(LoadedModel {
                classifier,
                loaded_at,
                load_duration,
                source: source.into(),
                input_shape,
            }),
        }
    }

    /// Create a handle backed by a [`MockClassifier`]
    pub fn mock(probabilities: Vec<f32>) -> Self {
        Self::new(
            Arc::new(MockClassifier::new(probabilities)),
            "mock",
            Utc::now(),
            Duration::ZERO,
            INPUT_SHAPE,
        )
    }

    /// Run one forward pass
    pub fn forward(&self, tensor: &ImageTensor) -> Result<Vec<f32>, ForwardError> {
        self.inner.classifier.forward(tensor)
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.inner.loaded_at
    }

    pub fn load_duration(&self) -> Duration {
        self.inner.load_duration
    }

    /// Load duration in seconds
    pub fn load_duration_secs(&self) -> f64 {
        self.inner.load_duration.as_secs_f64()
    }

    /// Where the artifact was fetched from
    pub fn source(&self) -> &str {
        &self.inner.source
    }

    /// Input shape the model was compiled for
    pub fn input_shape(&self) -> [usize; 4] {
        self.inner.input_shape
    }

    pub fn runtime(&self) -> &'static str {
        self.inner.classifier.runtime()
    }

    /// Check whether two handles refer to the same loaded model
    pub fn same_model(&self, other: &ModelHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("source", &self.inner.source)
            .field("runtime", &self.runtime())
            .field("loaded_at", &self.inner.loaded_at)
            .field("load_duration", &self.inner.load_duration)
            .field("input_shape", &self.inner.input_shape)
            .finish()
    }
}
