//! Shared types used across the upload pipeline and the repositories.
//!
//! [`UploadFile`] is the in-memory representation of a file picked by the
//! operator: it flows from disk (or a form) through image preparation into
//! the upload service, and must look the same at every stage.

use chrono::{DateTime, Utc};
use std::path::Path;

/// Opaque record identity assigned by the content store.
pub type RecordId = String;

/// A file on its way to the blob store.
///
/// `mime` is the *declared* type. Validation trusts it the same way the
/// bucket does; image preparation is what actually decodes the bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    /// Original file name, e.g. `pedra-azul.jpg`.
    pub name: String,
    /// Declared MIME type, e.g. `image/jpeg`.
    pub mime: String,
    pub bytes: Vec<u8>,
    pub modified_at: DateTime<Utc>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
            modified_at: Utc::now(),
        }
    }

    /// Read a file from disk, guessing the MIME type from its extension.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime = mime_guess::from_path(path).first_or_octet_stream().to_string();
        Ok(Self::new(name, mime, bytes))
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }
}
