//! Multipart form bodies.
//!
//! Parts are written in insertion order. The boundary is a SHA-256 hex digest
//! of the part keys and sizes, so the same form always gets the same boundary.

use std::fmt::Write as _;

use courier_core::{BodyError, RequestBody};
use ring::digest::{SHA256, digest};

use super::data::{file_extension, sniff_content_type};

// ============================================================================
// Parts
// ============================================================================

/// A file attached to a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartFile {
    /// File contents.
    pub data: Vec<u8>,
    /// Content type of the file.
    pub content_type: String,
    /// File name reported to the server.
    pub file_name: String,
    /// Content disposition, `form-data` when unset.
    pub disposition: Option<String>,
    /// Field name, the part key when unset.
    pub name: Option<String>,
    /// Transfer encoding, `binary` when unset.
    pub transfer_encoding: Option<String>,
}

impl MultipartFile {
    /// Creates a file part.
    pub fn new(
        data: impl Into<Vec<u8>>,
        content_type: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            data: data.into(),
            content_type: content_type.into(),
            file_name: file_name.into(),
            disposition: None,
            name: None,
            transfer_encoding: None,
        }
    }

    /// Creates a file part from raw bytes, sniffing the content type.
    ///
    /// Returns `None` when the bytes are not a recognized format.
    pub fn sniffed(data: impl Into<Vec<u8>>) -> Option<Self> {
        let data = data.into();
        let content_type = sniff_content_type(&data)?;
        let extension = file_extension(content_type)?;
        Some(Self::new(data, content_type, format!("filename.{extension}")))
    }

    /// Sets the content disposition.
    #[must_use]
    pub fn disposition(mut self, disposition: impl Into<String>) -> Self {
        self.disposition = Some(disposition.into());
        self
    }

    /// Sets the field name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the transfer encoding.
    #[must_use]
    pub fn transfer_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.transfer_encoding = Some(encoding.into());
        self
    }

    fn write_to(&self, out: &mut Vec<u8>, boundary: &str, key: &str) {
        let mut head = String::new();
        let _ = write!(
            head,
            "--{boundary}\r\nContent-Disposition: {}; name=\"{}\"; filename=\"{}\"\r\n",
            self.disposition.as_deref().unwrap_or("form-data"),
            self.name.as_deref().unwrap_or(key),
            self.file_name
        );
        let _ = write!(
            head,
            "Content-Type: {}\r\nContent-Transfer-Encoding: {}\r\n\r\n",
            self.content_type,
            self.transfer_encoding.as_deref().unwrap_or("binary")
        );
        out.extend_from_slice(head.as_bytes());
        out.extend_from_slice(&self.data);
        out.extend_from_slice(b"\r\n");
    }
}

/// One value in a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultipartPart {
    /// A plain text field.
    Text(String),
    /// A file.
    File(MultipartFile),
}

impl MultipartPart {
    fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::File(file) => file.data.len(),
        }
    }

    fn write_to(&self, out: &mut Vec<u8>, boundary: &str, key: &str) {
        match self {
            Self::Text(text) => {
                let part = format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"{key}\"\r\n\r\n{text}\r\n"
                );
                out.extend_from_slice(part.as_bytes());
            }
            Self::File(file) => file.write_to(out, boundary, key),
        }
    }
}

impl From<&str> for MultipartPart {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MultipartPart {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<MultipartFile> for MultipartPart {
    fn from(value: MultipartFile) -> Self {
        Self::File(value)
    }
}

// ============================================================================
// Multipart Body
// ============================================================================

/// A `multipart/form-data` body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartBody {
    parts: Vec<(String, MultipartPart)>,
}

impl MultipartBody {
    /// Creates an empty form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a part under `key`.
    #[must_use]
    pub fn part(mut self, key: impl Into<String>, part: impl Into<MultipartPart>) -> Self {
        self.parts.push((key.into(), part.into()));
        self
    }

    /// Returns the parts.
    pub fn parts(&self) -> &[(String, MultipartPart)] {
        &self.parts
    }

    /// Returns the boundary separating parts.
    pub fn boundary(&self) -> String {
        let mut seed = String::new();
        for (key, part) in &self.parts {
            let _ = write!(seed, "{key}:{};", part.len());
        }

        digest(&SHA256, seed.as_bytes())
            .as_ref()
            .iter()
            .fold(String::with_capacity(64), |mut hex, byte| {
                let _ = write!(hex, "{byte:02x}");
                hex
            })
    }
}

impl RequestBody for MultipartBody {
    fn content_type(&self) -> Option<String> {
        Some(format!("multipart/form-data; boundary={}", self.boundary()))
    }

    fn payload(&self) -> Result<Vec<u8>, BodyError> {
        let boundary = self.boundary();
        let mut out = Vec::new();
        for (key, part) in &self.parts {
            part.write_to(&mut out, &boundary, key);
        }
        out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        Ok(out)
    }
}
