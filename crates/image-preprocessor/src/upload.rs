//! Upload boundary checks

use crate::UnsupportedFormatError;
use image::ImageFormat;
use serde::{Deserialize, Serialize};

/// Accepted upload types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadKind {
    Jpeg,
    Png,
}

impl UploadKind {
    /// Resolve the upload kind from a declared MIME type and/or file name.
    ///
    /// A recognised MIME type wins; otherwise the file extension decides.
    /// Generic MIME types such as `application/octet-stream` fall through to
    /// the extension.
    pub fn from_hint(
        content_type: Option<&str>,
        file_name: Option<&str>,
    ) -> Result<Self, UnsupportedFormatError> {
        if let Some(kind) = content_type.and_then(Self::from_mime) {
            return Ok(kind);
        }
        if let Some(kind) = file_name.and_then(Self::from_file_name) {
            return Ok(kind);
        }

        let declared = match (content_type, file_name) {
            (_, Some(name)) => name.to_string(),
            (Some(mime), None) => mime.to_string(),
            (None, None) => "unknown".to_string(),
        };
        Err(UnsupportedFormatError::DeclaredType(declared))
    }

    /// Map a MIME type (parameters ignored) to an upload kind
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(UploadKind::Jpeg),
            "image/png" => Some(UploadKind::Png),
            _ => None,
        }
    }

    /// Map a file name's extension to an upload kind
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(UploadKind::Jpeg),
            "png" => Some(UploadKind::Png),
            _ => None,
        }
    }

    /// Map a sniffed image format to an upload kind
    pub fn from_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(UploadKind::Jpeg),
            ImageFormat::Png => Some(UploadKind::Png),
            _ => None,
        }
    }

    /// MIME type used when serving the upload back
    pub fn mime_type(&self) -> &'static str {
        match self {
            UploadKind::Jpeg => "image/jpeg",
            UploadKind::Png => "image/png",
        }
    }

    /// Decoder format for this kind
    pub fn image_format(&self) -> ImageFormat {
        match self {
            UploadKind::Jpeg => ImageFormat::Jpeg,
            UploadKind::Png => ImageFormat::Png,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_hint() {
        assert_eq!(UploadKind::from_hint(Some("image/png"), None), Ok(UploadKind::Png));
        assert_eq!(
            UploadKind::from_hint(Some("image/jpeg; charset=binary"), None),
            Ok(UploadKind::Jpeg)
        );
    }

    #[test]
    fn test_extension_hint() {
        assert_eq!(UploadKind::from_hint(None, Some("sample.JPG")), Ok(UploadKind::Jpeg));
        assert_eq!(UploadKind::from_hint(None, Some("slide.jpeg")), Ok(UploadKind::Jpeg));
        assert_eq!(
            UploadKind::from_hint(Some("application/octet-stream"), Some("tile.png")),
            Ok(UploadKind::Png)
        );
    }

    #[test]
    fn test_rejected_hints() {
        assert!(matches!(
            UploadKind::from_hint(Some("image/gif"), Some("anim.gif")),
            Err(UnsupportedFormatError::DeclaredType(name)) if name == "anim.gif"
        ));
        assert!(UploadKind::from_hint(None, Some("notes.txt")).is_err());
        assert!(UploadKind::from_hint(None, Some("no_extension")).is_err());
        assert!(UploadKind::from_hint(None, None).is_err());
    }
}
