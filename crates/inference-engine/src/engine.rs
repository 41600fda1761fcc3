//! Inference Engine Implementation

use crate::{ClassLabel, ImageRef, InferenceError, PredictionRecord, CLASS_COUNT};
use chrono::Utc;
use image_preprocessor::ImageTensor;
use model_provider::ModelHandle;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Slack allowed outside [0, 1] for float rounding in the model's softmax
    pub probability_tolerance: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            probability_tolerance: 1e-4,
        }
    }
}

/// Label and confidence derived from one probability vector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub label: ClassLabel,
    /// Maximum probability (0.0 to 1.0)
    pub confidence: f32,
    pub probabilities: [f32; CLASS_COUNT],
}

/// Index and value of the largest score; the first occurrence wins ties.
pub fn argmax(scores: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &score) in scores.iter().enumerate() {
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((i, score)),
        }
    }
    best
}

/// Single-image classifier front end
pub struct InferenceEngine {
    config: EngineConfig,
}

impl InferenceEngine {
    /// Create a new inference engine
    pub fn new(config: EngineConfig) -> Self {
        info!("Creating inference engine: {:?}", config);
        Self { config }
    }

    /// Classify one preprocessed image.
    ///
    /// The forward pass runs on the blocking pool and completes even if the
    /// returned future is dropped. Latency covers the forward pass only.
    pub async fn predict(
        &self,
        model: &ModelHandle,
        tensor: ImageTensor,
        source: ImageRef,
    ) -> Result<PredictionRecord, InferenceError> {
        let expected = model.input_shape();
        let actual = tensor.shape();
        if expected != actual {
            return Err(InferenceError::InvalidInputShape {
                expected: format!("{:?}", expected),
                actual: format!("{:?}", actual),
            });
        }

        let model = model.clone();
        let (scores, latency) = tokio::task::spawn_blocking(move || {
            let start = Instant::now();
            let scores = model.forward(&tensor);
            (scores, start.elapsed())
        })
        .await
        .map_err(|_| InferenceError::WorkerPanicked)?;

        let scores = scores.map_err(|e| InferenceError::Forward(e.to_string()))?;
        let classification = self.classify(&scores)?;

        debug!(
            "Prediction: {:?} (conf={:.4}, latency={:.4}s)",
            classification.label,
            classification.confidence,
            latency.as_secs_f64()
        );

        Ok(PredictionRecord {
            class_label: classification.label,
            confidence_percent: f64::from(classification.confidence) * 100.0,
            inference_latency_seconds: latency.as_secs_f64(),
            source_image: source,
            probabilities: classification.probabilities,
            predicted_at: Utc::now(),
        })
    }

    /// Derive label and confidence from a raw probability vector
    pub fn classify(&self, scores: &[f32]) -> Result<Classification, InferenceError> {
        if scores.len() != CLASS_COUNT {
            return Err(InferenceError::UnexpectedOutputWidth(scores.len()));
        }

        let tol = self.config.probability_tolerance;
        let mut probabilities = [0.0f32; CLASS_COUNT];
        for (index, &value) in scores.iter().enumerate() {
            if !value.is_finite() || value < -tol || value > 1.0 + tol {
                return Err(InferenceError::InvalidProbability { index, value });
            }
            probabilities[index] = value.clamp(0.0, 1.0);
        }

        let (index, confidence) =
            argmax(&probabilities).ok_or(InferenceError::UnexpectedOutputWidth(0))?;
        let label =
            ClassLabel::from_index(index).ok_or(InferenceError::UnexpectedOutputWidth(index + 1))?;

        Ok(Classification {
            label,
            confidence,
            probabilities,
        })
    }
}

impl Default for InferenceEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image_preprocessor::{UploadKind, INPUT_SHAPE};
    use ndarray::Array4;
    use proptest::prelude::*;

    fn input() -> ImageTensor {
        ImageTensor::from_array(Array4::from_elem(
            (INPUT_SHAPE[0], INPUT_SHAPE[1], INPUT_SHAPE[2], INPUT_SHAPE[3]),
            0.5,
        ))
    }

    fn image_ref() -> ImageRef {
        ImageRef::new(UploadKind::Png, Some("tile.png".to_string()), 1024)
    }

    struct BrokenClassifier;

    impl model_provider::Classifier for BrokenClassifier {
        fn forward(&self, _: &ImageTensor) -> Result<Vec<f32>, model_provider::ForwardError> {
            Err(model_provider::ForwardError("graph execution failed".to_string()))
        }

        fn runtime(&self) -> &'static str {
            "broken"
        }
    }

    #[tokio::test]
    async fn test_forward_failure_is_reported() {
        let model = ModelHandle::new(
            std::sync::Arc::new(BrokenClassifier),
            "memory://broken",
            chrono::Utc::now(),
            std::time::Duration::ZERO,
            INPUT_SHAPE,
        );

        let err = InferenceEngine::default()
            .predict(&model, input(), image_ref())
            .await
            .unwrap_err();
        assert!(matches!(err, InferenceError::Forward(ref msg) if msg.contains("graph execution failed")));
    }

    #[test]
    fn test_argmax_first_occurrence_wins() {
        assert_eq!(argmax(&[0.4, 0.4, 0.2]), Some((0, 0.4)));
        assert_eq!(argmax(&[0.1, 0.45, 0.45]), Some((1, 0.45)));
        assert_eq!(argmax(&[]), None);
    }

    #[tokio::test]
    async fn test_benign_prediction() {
        let engine = InferenceEngine::default();
        let model = ModelHandle::mock(vec![0.02, 0.9512, 0.0288]);

        let record = engine.predict(&model, input(), image_ref()).await.unwrap();
        assert_eq!(record.class_label, ClassLabel::Benign);
        assert!(record.confidence_percent >= 93.67);
        assert!((record.confidence_percent - 95.12).abs() < 1e-3);
        assert!(record.inference_latency_seconds >= 0.0);
        assert_eq!(record.source_image.file_name.as_deref(), Some("tile.png"));
    }

    #[tokio::test]
    async fn test_predict_is_repeatable() {
        let engine = InferenceEngine::default();
        let model = ModelHandle::mock(vec![0.7, 0.1, 0.2]);

        let a = engine.predict(&model, input(), image_ref()).await.unwrap();
        let b = engine.predict(&model, input(), image_ref()).await.unwrap();
        assert_eq!(a.class_label, b.class_label);
        assert_eq!(a.confidence_percent, b.confidence_percent);
        assert_eq!(a.class_label, ClassLabel::Adenocarcinoma);
    }

    #[tokio::test]
    async fn test_shape_mismatch_rejected() {
        let engine = InferenceEngine::default();
        let model = ModelHandle::mock(vec![0.2, 0.2, 0.6]);
        let small = ImageTensor::from_array(Array4::zeros((1, 64, 64, 3)));

        let err = engine.predict(&model, small, image_ref()).await.unwrap_err();
        assert!(matches!(err, InferenceError::InvalidInputShape { .. }));
    }

    #[tokio::test]
    async fn test_wrong_output_width_rejected() {
        let engine = InferenceEngine::default();
        let model = ModelHandle::mock(vec![0.1, 0.2, 0.3, 0.4]);

        let err = engine.predict(&model, input(), image_ref()).await.unwrap_err();
        assert!(matches!(err, InferenceError::UnexpectedOutputWidth(4)));
    }

    #[test]
    fn test_invalid_probabilities_rejected() {
        let engine = InferenceEngine::default();
        assert!(matches!(
            engine.classify(&[f32::NAN, 0.5, 0.5]),
            Err(InferenceError::InvalidProbability { index: 0, .. })
        ));
        assert!(matches!(
            engine.classify(&[0.1, 1.5, 0.2]),
            Err(InferenceError::InvalidProbability { index: 1, .. })
        ));
    }

    #[test]
    fn test_rounding_slack_is_clamped() {
        let engine = InferenceEngine::default();
        let result = engine.classify(&[1.00001, 0.0, -0.00001]).unwrap();
        assert_eq!(result.label, ClassLabel::Adenocarcinoma);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.probabilities[2], 0.0);
    }

    proptest! {
        #[test]
        fn prop_label_and_confidence_in_range(a in 0.0f32..=1.0, b in 0.0f32..=1.0, c in 0.0f32..=1.0) {
            let engine = InferenceEngine::default();
            let result = engine.classify(&[a, b, c]).unwrap();
            let max = a.max(b).max(c);

            prop_assert!(ClassLabel::ALL.contains(&result.label));
            prop_assert_eq!(result.confidence, max);
            prop_assert_eq!(result.probabilities[result.label.index()], max);
            let percent = f64::from(result.confidence) * 100.0;
            prop_assert!((0.0..=100.0).contains(&percent));
        }
    }
}
