//! Model deserialization and the forward-pass capability

use crate::ModelAcquisitionError;
use image_preprocessor::{ImageTensor, INPUT_SHAPE};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use tract_onnx::prelude::*;

/// Forward pass failure reported by a classifier
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ForwardError(pub String);

/// Narrow predict capability of a loaded model
pub trait Classifier: Send + Sync {
    /// Run one forward pass, returning the class probability vector
    fn forward(&self, tensor: &ImageTensor) -> Result<Vec<f32>, ForwardError>;

    /// Runtime name for logging
    fn runtime(&self) -> &'static str;
}

/// Turns a stored artifact into a runnable classifier
pub trait ModelLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Arc<dyn Classifier>, ModelAcquisitionError>;
}

type OnnxPlan = TypedRunnableModel<TypedModel>;

/// Loads ONNX artifacts with tract
#[derive(Debug, Clone)]
pub struct OnnxModelLoader {
    input_shape: [usize; 4],
}

impl OnnxModelLoader {
    pub fn new(input_shape: [usize; 4]) -> Self {
        Self { input_shape }
    }
}

impl Default for OnnxModelLoader {
    fn default() -> Self {
        Self::new(INPUT_SHAPE)
    }
}

impl ModelLoader for OnnxModelLoader {
    fn load(&self, path: &Path) -> Result<Arc<dyn Classifier>, ModelAcquisitionError> {
        info!("Loading ONNX model from {}", path.display());
        let [n, h, w, c] = self.input_shape;

        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|model| {
                model.with_input_fact(0, InferenceFact::dt_shape(f32::datum_type(), tvec!(n, h, w, c)))
            })
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| ModelAcquisitionError::Deserialize(e.to_string()))?;

        Ok(Arc::new(OnnxClassifier {
            plan,
            input_shape: self.input_shape,
        }))
    }
}

/// tract-backed classifier
struct OnnxClassifier {
    plan: OnnxPlan,
    input_shape: [usize; 4],
}

impl Classifier for OnnxClassifier {
    fn forward(&self, tensor: &ImageTensor) -> Result<Vec<f32>, ForwardError> {
        if tensor.shape() != self.input_shape {
            return Err(ForwardError(format!(
                "model expects {:?}, got {:?}",
                self.input_shape,
                tensor.shape()
            )));
        }

        let values = tensor.to_vec();
        let input = Tensor::from_shape::<f32>(&self.input_shape, &values)
            .map_err(|e| ForwardError(e.to_string()))?;
        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| ForwardError(e.to_string()))?;

        let first = outputs
            .first()
            .ok_or_else(|| ForwardError("model produced no outputs".to_string()))?;
        let scores = first
            .to_array_view::<f32>()
            .map_err(|e| ForwardError(e.to_string()))?;

        debug!("Forward pass produced {} scores", scores.len());
        Ok(scores.iter().copied().collect())
    }

    fn runtime(&self) -> &'static str {
        "tract-onnx"
    }
}

/// Classifier returning fixed probabilities (demos and tests)
#[derive(Debug, Clone)]
pub struct MockClassifier {
    probabilities: Vec<f32>,
}

impl MockClassifier {
    pub fn new(probabilities: Vec<f32>) -> Self {
        Self { probabilities }
    }
}

impl Classifier for MockClassifier {
    fn forward(&self, tensor: &ImageTensor) -> Result<Vec<f32>, ForwardError> {
        if tensor.shape() != INPUT_SHAPE {
            return Err(ForwardError(format!(
                "model expects {:?}, got {:?}",
                INPUT_SHAPE,
                tensor.shape()
            )));
        }
        Ok(self.probabilities.clone())
    }

    fn runtime(&self) -> &'static str {
        "mock"
    }
}

/// Loader that ignores the artifact contents and yields a [`MockClassifier`]
#[derive(Debug, Clone)]
pub struct MockModelLoader {
    probabilities: Vec<f32>,
}

impl MockModelLoader {
    pub fn new(probabilities: Vec<f32>) -> Self {
        Self { probabilities }
    }
}

impl ModelLoader for MockModelLoader {
    fn load(&self, path: &Path) -> Result<Arc<dyn Classifier>, ModelAcquisitionError> {
        debug!("Mock loader: skipping deserialization of {}", path.display());
        Ok(Arc::new(MockClassifier::new(self.probabilities.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;
    use std::path::PathBuf;

    /// ReduceMean over H and W followed by Softmax: `[1,224,224,3]` to `[1,3]`
    fn fixture_model() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/mean_softmax.onnx")
    }

    #[test]
    fn test_onnx_loader_runs_nhwc_model() {
        let classifier = OnnxModelLoader::default().load(&fixture_model()).unwrap();
        assert_eq!(classifier.runtime(), "tract-onnx");

        let mut input = Array4::<f32>::zeros((1, 224, 224, 3));
        input.slice_mut(ndarray::s![.., .., .., 0]).fill(1.0);
        let scores = classifier.forward(&ImageTensor::from_array(input)).unwrap();

        assert_eq!(scores.len(), 3);
        let e = std::f32::consts::E;
        assert!((scores[0] - e / (e + 2.0)).abs() < 1e-4);
        assert!((scores[1] - 1.0 / (e + 2.0)).abs() < 1e-4);
        assert!((scores[1] - scores[2]).abs() < 1e-6);
        assert!((scores.iter().sum::<f32>() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_onnx_loader_uniform_input() {
        let classifier = OnnxModelLoader::default().load(&fixture_model()).unwrap();
        let scores = classifier
            .forward(&ImageTensor::from_array(Array4::zeros((1, 224, 224, 3))))
            .unwrap();
        for score in scores {
            assert!((score - 1.0 / 3.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_onnx_classifier_rejects_wrong_shape() {
        let classifier = OnnxModelLoader::default().load(&fixture_model()).unwrap();
        let result = classifier.forward(&ImageTensor::from_array(Array4::zeros((1, 64, 64, 3))));
        assert!(result.is_err());
    }

    #[test]
    fn test_onnx_loader_rejects_garbage() {
        let path = std::env::temp_dir().join(format!("garbage-model-{}.onnx", std::process::id()));
        std::fs::write(&path, b"not a protobuf model").unwrap();

        let result = OnnxModelLoader::default().load(&path);
        let _ = std::fs::remove_file(&path);
        assert!(matches!(result, Err(ModelAcquisitionError::Deserialize(_))));
    }

    #[test]
    fn test_onnx_loader_missing_file() {
        let result = OnnxModelLoader::default().load(Path::new("/nonexistent/model.onnx"));
        assert!(matches!(result, Err(ModelAcquisitionError::Deserialize(_))));
    }

    #[test]
    fn test_mock_classifier_checks_shape() {
        let classifier = MockClassifier::new(vec![0.1, 0.8, 0.1]);
        let good = ImageTensor::from_array(Array4::zeros((1, 224, 224, 3)));
        let bad = ImageTensor::from_array(Array4::zeros((1, 32, 32, 3)));

        assert_eq!(classifier.forward(&good).unwrap(), vec![0.1, 0.8, 0.1]);
        assert!(classifier.forward(&bad).is_err());
    }
}
