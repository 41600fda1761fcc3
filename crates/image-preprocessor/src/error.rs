//! Preprocessing Error Types

use thiserror::Error;

/// Upload could not be turned into a model input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnsupportedFormatError {
    /// Declared MIME type or file extension is not JPEG or PNG
    #[error("Unsupported upload type: {0} (expected JPEG or PNG)")]
    DeclaredType(String),

    /// Bytes are a recognised image, but not JPEG or PNG
    #[error("Unsupported image format: {0} (expected JPEG or PNG)")]
    Format(String),

    /// Bytes are not a decodable image
    #[error("Image could not be decoded: {0}")]
    Undecodable(String),

    /// Image dimensions exceed the configured bound
    #[error("Image exceeds size limits: {0}")]
    TooLarge(String),

    /// Upload body was empty
    #[error("Uploaded image is empty")]
    Empty,
}

impl From<image::ImageError> for UnsupportedFormatError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Limits(e) => UnsupportedFormatError::TooLarge(e.to_string()),
            other => UnsupportedFormatError::Undecodable(other.to_string()),
        }
    }
}
