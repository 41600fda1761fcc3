//! Image Preprocessing
//!
//! Turns uploaded histopathology images into fixed-shape model input tensors:
//! - Upload type checks at the boundary (JPEG / PNG only)
//! - Decoding and RGB conversion
//! - Exact resize to the model input size
//! - Scaling of channel values into [0, 1]

mod error;
mod preprocessor;
mod tensor;
mod upload;

pub use error::UnsupportedFormatError;
pub use preprocessor::{ImagePreprocessor, PreprocessConfig, ResizeFilter, DEFAULT_MAX_DIMENSION};
pub use tensor::ImageTensor;
pub use upload::UploadKind;

/// Model input height in pixels
pub const INPUT_HEIGHT: usize = 224;

/// Model input width in pixels
pub const INPUT_WIDTH: usize = 224;

/// Number of colour channels (RGB)
pub const INPUT_CHANNELS: usize = 3;

/// Full NHWC input shape expected by the classifier (batch of one)
pub const INPUT_SHAPE: [usize; 4] = [1, INPUT_HEIGHT, INPUT_WIDTH, INPUT_CHANNELS];
