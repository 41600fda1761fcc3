//! Prediction records

use crate::ClassLabel;
use chrono::{DateTime, Utc};
use image_preprocessor::UploadKind;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque reference to the original upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub id: Uuid,
    pub file_name: Option<String>,
    pub kind: UploadKind,
    pub byte_len: usize,
}

impl ImageRef {
    /// Reference a new upload
    pub fn new(kind: UploadKind, file_name: Option<String>, byte_len: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_name,
            kind,
            byte_len,
        }
    }
}

/// Result of classifying one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    /// Predicted class (argmax of the output)
    pub class_label: ClassLabel,
    /// Maximum class probability, as a percentage (0 to 100)
    pub confidence_percent: f64,
    /// Wall-clock time of the forward pass only
    pub inference_latency_seconds: f64,
    /// Upload this prediction was made for
    pub source_image: ImageRef,
    /// Per-class probabilities in model output order
    pub probabilities: [f32; 3],
    /// When the prediction was made
    pub predicted_at: DateTime<Utc>,
}
