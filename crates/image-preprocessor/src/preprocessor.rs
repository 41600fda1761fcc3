//! Image Preprocessor Implementation

use crate::{ImageTensor, UnsupportedFormatError, UploadKind, INPUT_CHANNELS, INPUT_HEIGHT, INPUT_WIDTH};
use image::imageops::{self, FilterType};
use image::{ImageReader, Limits};
use std::io::Cursor;
use ndarray::Array4;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Resampling filter used for the exact resize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Default bound on source image width and height
pub const DEFAULT_MAX_DIMENSION: u32 = 8192;

/// Preprocessing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Target width in pixels
    pub width: u32,
    /// Target height in pixels
    pub height: u32,
    /// Resampling filter
    pub filter: ResizeFilter,
    /// Largest accepted source width or height, checked before decoding
    pub max_dimension: u32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        // Nearest matches the resampling the classifier was trained with
        Self {
            width: INPUT_WIDTH as u32,
            height: INPUT_HEIGHT as u32,
            filter: ResizeFilter::Nearest,
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }
}

impl PreprocessConfig {
    /// Smoother resampling for very large slide tiles
    pub fn smooth() -> Self {
        Self {
            filter: ResizeFilter::Triangle,
            ..Default::default()
        }
    }
}

/// Converts raw uploads into normalized model input tensors
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    config: PreprocessConfig,
}

impl ImagePreprocessor {
    /// Create a preprocessor with the given configuration
    pub fn new(config: PreprocessConfig) -> Self {
        info!(
            "Creating image preprocessor: {}x{}, filter={:?}",
            config.width, config.height, config.filter
        );
        Self { config }
    }

    /// Get configuration
    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Sniff the actual encoding of the bytes, accepting only JPEG and PNG
    pub fn detect_kind(raw: &[u8]) -> Result<UploadKind, UnsupportedFormatError> {
        if raw.is_empty() {
            return Err(UnsupportedFormatError::Empty);
        }
        let format = image::guess_format(raw)?;
        UploadKind::from_format(format)
            .ok_or_else(|| UnsupportedFormatError::Format(format!("{:?}", format)))
    }

    /// Decode, resize and scale an uploaded image.
    ///
    /// The result has shape `[1, height, width, 3]` with every value in `[0, 1]`.
    /// Identical input bytes always produce an identical tensor.
    pub fn preprocess(&self, raw: &[u8]) -> Result<ImageTensor, UnsupportedFormatError> {
        self.preprocess_upload(raw).map(|(_, tensor)| tensor)
    }

    /// Same as [`preprocess`](Self::preprocess), also returning the kind sniffed from the bytes
    pub fn preprocess_upload(
        &self,
        raw: &[u8],
    ) -> Result<(UploadKind, ImageTensor), UnsupportedFormatError> {
        let kind = Self::detect_kind(raw)?;

        let mut limits = Limits::default();
        limits.max_image_width = Some(self.config.max_dimension);
        limits.max_image_height = Some(self.config.max_dimension);
        let mut reader = ImageReader::with_format(Cursor::new(raw), kind.image_format());
        reader.limits(limits);
        let decoded = reader.decode()?;
        debug!(
            "Decoded {:?} upload: {}x{}",
            kind,
            decoded.width(),
            decoded.height()
        );

        let rgb = decoded.to_rgb8();
        let resized = imageops::resize(
            &rgb,
            self.config.width,
            self.config.height,
            self.config.filter.into(),
        );

        let shape = (
            1,
            self.config.height as usize,
            self.config.width as usize,
            INPUT_CHANNELS,
        );
        let data = Array4::from_shape_fn(shape, |(_, y, x, c)| {
            resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
        });

        Ok((kind, ImageTensor::from_array(data)))
    }
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new(PreprocessConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use proptest::prelude::*;
    use std::io::Cursor;

    fn encode(img: &RgbImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img.clone())
            .write_to(&mut buf, format)
            .unwrap();
        buf.into_inner()
    }

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    #[test]
    fn test_png_shape_and_range() {
        let bytes = encode(&gradient(640, 480), ImageFormat::Png);
        let tensor = ImagePreprocessor::default().preprocess(&bytes).unwrap();

        assert_eq!(tensor.shape(), [1, 224, 224, 3]);
        let (lo, hi) = tensor.min_max().unwrap();
        assert!(lo >= 0.0 && hi <= 1.0);
    }

    #[test]
    fn test_jpeg_small_input_is_upscaled() {
        let bytes = encode(&gradient(31, 17), ImageFormat::Jpeg);
        let tensor = ImagePreprocessor::default().preprocess(&bytes).unwrap();
        assert_eq!(tensor.shape(), [1, 224, 224, 3]);
    }

    #[test]
    fn test_scaling_by_255() {
        let img = RgbImage::from_pixel(8, 8, Rgb([255, 0, 51]));
        let bytes = encode(&img, ImageFormat::Png);
        let tensor = ImagePreprocessor::default().preprocess(&bytes).unwrap();

        let view = tensor.view();
        assert_eq!(view[[0, 100, 100, 0]], 1.0);
        assert_eq!(view[[0, 100, 100, 1]], 0.0);
        assert!((view[[0, 100, 100, 2]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_grayscale_is_expanded_to_rgb() {
        let gray = image::GrayImage::from_pixel(10, 10, image::Luma([128]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(gray)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();

        let tensor = ImagePreprocessor::default().preprocess(buf.get_ref()).unwrap();
        assert_eq!(tensor.shape(), [1, 224, 224, 3]);
        let view = tensor.view();
        assert_eq!(view[[0, 5, 5, 0]], view[[0, 5, 5, 2]]);
    }

    #[test]
    fn test_rejects_non_image_bytes() {
        let err = ImagePreprocessor::default()
            .preprocess(b"this is definitely not a picture")
            .unwrap_err();
        assert!(matches!(err, UnsupportedFormatError::Undecodable(_)));
    }

    #[test]
    fn test_rejects_empty_upload() {
        let err = ImagePreprocessor::default().preprocess(&[]).unwrap_err();
        assert_eq!(err, UnsupportedFormatError::Empty);
    }

    #[test]
    fn test_rejects_other_image_formats() {
        let bytes = encode(&gradient(4, 4), ImageFormat::Bmp);
        let err = ImagePreprocessor::default().preprocess(&bytes).unwrap_err();
        assert!(matches!(err, UnsupportedFormatError::Format(_)));
    }

    #[test]
    fn test_truncated_png_is_undecodable() {
        let bytes = encode(&gradient(64, 64), ImageFormat::Png);
        let err = ImagePreprocessor::default()
            .preprocess(&bytes[..bytes.len() / 3])
            .unwrap_err();
        assert!(matches!(err, UnsupportedFormatError::Undecodable(_)));
    }

    #[test]
    fn test_rejects_images_over_dimension_bound() {
        let bytes = encode(&gradient(300, 40), ImageFormat::Png);
        let preprocessor = ImagePreprocessor::new(PreprocessConfig {
            max_dimension: 256,
            ..Default::default()
        });

        let err = preprocessor.preprocess(&bytes).unwrap_err();
        assert!(matches!(err, UnsupportedFormatError::TooLarge(_)));

        let fits = encode(&gradient(256, 256), ImageFormat::Png);
        assert!(preprocessor.preprocess(&fits).is_ok());
    }

    #[test]
    fn test_preprocess_upload_reports_sniffed_kind() {
        let preprocessor = ImagePreprocessor::default();

        let jpeg = encode(&gradient(16, 16), ImageFormat::Jpeg);
        let (kind, tensor) = preprocessor.preprocess_upload(&jpeg).unwrap();
        assert_eq!(kind, UploadKind::Jpeg);
        assert_eq!(tensor.shape(), [1, 224, 224, 3]);

        let png = encode(&gradient(16, 16), ImageFormat::Png);
        assert_eq!(preprocessor.preprocess_upload(&png).unwrap().0, UploadKind::Png);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_deterministic_and_normalized(width in 1u32..300, height in 1u32..300, seed in any::<u8>()) {
            let img = RgbImage::from_fn(width, height, |x, y| {
                Rgb([seed.wrapping_add(x as u8), seed.wrapping_mul(y as u8), (x ^ y) as u8])
            });
            let bytes = encode(&img, ImageFormat::Png);
            let preprocessor = ImagePreprocessor::default();

            let first = preprocessor.preprocess(&bytes).unwrap();
            let second = preprocessor.preprocess(&bytes).unwrap();

            prop_assert_eq!(first.shape(), [1, 224, 224, 3]);
            let (lo, hi) = first.min_max().unwrap();
            prop_assert!(lo >= 0.0 && hi <= 1.0);

            let a: Vec<u32> = first.to_vec().iter().map(|v| v.to_bits()).collect();
            let b: Vec<u32> = second.to_vec().iter().map(|v| v.to_bits()).collect();
            prop_assert_eq!(a, b);
        }
    }
}
