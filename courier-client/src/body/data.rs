//! Raw byte and plain text bodies.

use courier_core::{BodyError, RequestBody};

/// Guesses a content type from the first byte of a payload.
///
/// Only the handful of signatures that matter for uploads are recognized.
pub fn sniff_content_type(bytes: &[u8]) -> Option<&'static str> {
    match bytes.first()? {
        0xFF => Some("image/jpeg"),
        0x89 => Some("image/png"),
        0x47 => Some("image/gif"),
        0x49 | 0x4D => Some("image/tiff"),
        0x00 => Some("video/quicktime"),
        0x44 => Some("text/plain"),
        _ => None,
    }
}

/// Maps a content type to the file extension used for generated file names.
pub fn file_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/tiff" => Some("tiff"),
        "text/plain" => Some("txt"),
        "video/quicktime" => Some("mov"),
        _ => None,
    }
}

// ============================================================================
// Data Body
// ============================================================================

/// A body made of raw bytes.
///
/// The content type is sniffed from the payload unless one is given explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBody {
    bytes: Vec<u8>,
    content_type: Option<String>,
}

impl DataBody {
    /// Wraps raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: None,
        }
    }

    /// Sets an explicit content type, bypassing sniffing.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Returns the payload bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl RequestBody for DataBody {
    fn content_type(&self) -> Option<String> {
        self.content_type
            .clone()
            .or_else(|| sniff_content_type(&self.bytes).map(str::to_string))
    }

    fn payload(&self) -> Result<Vec<u8>, BodyError> {
        Ok(self.bytes.clone())
    }
}

// ============================================================================
// Text Body
// ============================================================================

/// A UTF-8 plain text body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBody(pub String);

impl RequestBody for TextBody {
    fn content_type(&self) -> Option<String> {
        Some("text/plain; charset=utf-8".to_string())
    }

    fn payload(&self) -> Result<Vec<u8>, BodyError> {
        Ok(self.0.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniffing() {
        assert_eq!(sniff_content_type(&[0xFF, 0xD8, 0xFF]), Some("image/jpeg"));
        assert_eq!(sniff_content_type(b"\x89PNG\r\n"), Some("image/png"));
        assert_eq!(sniff_content_type(b"GIF89a"), Some("image/gif"));
        assert_eq!(sniff_content_type(b"II*\0"), Some("image/tiff"));
        assert_eq!(sniff_content_type(b"MM\0*"), Some("image/tiff"));
        assert_eq!(sniff_content_type(&[0x00, 0x00, 0x00, 0x14]), Some("video/quicktime"));
        assert_eq!(sniff_content_type(b"Dear diary"), Some("text/plain"));
        assert_eq!(sniff_content_type(b"{}"), None);
        assert_eq!(sniff_content_type(&[]), None);
    }

    #[test]
    fn test_extensions() {
        assert_eq!(file_extension("image/jpeg"), Some("jpg"));
        assert_eq!(file_extension("video/quicktime"), Some("mov"));
        assert_eq!(file_extension("application/json"), None);
    }

    #[test]
    fn test_data_body_content_type() {
        assert_eq!(
            DataBody::new(vec![0x89, 0x50]).content_type().as_deref(),
            Some("image/png")
        );
        assert_eq!(DataBody::new(b"{}".to_vec()).content_type(), None);
        assert_eq!(
            DataBody::new(vec![0x89])
                .with_content_type("application/octet-stream")
                .content_type()
                .as_deref(),
            Some("application/octet-stream")
        );
    }

    #[test]
    fn test_text_body() {
        let body = TextBody("hello".to_string());
        assert_eq!(body.payload().unwrap(), b"hello");
        assert!(body.content_type().unwrap().starts_with("text/plain"));
    }
}
