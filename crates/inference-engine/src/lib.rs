//! Inference Engine
//!
//! Runs the lung tissue classifier on a single preprocessed image and turns
//! the probability vector into a labelled, timed prediction.

mod engine;
mod label;
mod record;

pub use engine::{argmax, Classification, EngineConfig, InferenceEngine};
pub use label::{ClassLabel, CLASS_COUNT};
pub use record::{ImageRef, PredictionRecord};

use thiserror::Error;

/// Errors during inference
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Inference failed: {0}")]
    Forward(String),
    #[error("Invalid input shape: expected {expected}, got {actual}")]
    InvalidInputShape { expected: String, actual: String },
    #[error("Model produced {0} scores, expected 3")]
    UnexpectedOutputWidth(usize),
    #[error("Model produced invalid probability {value} at index {index}")]
    InvalidProbability { index: usize, value: f32 },
    #[error("Inference worker panicked")]
    WorkerPanicked,
}
