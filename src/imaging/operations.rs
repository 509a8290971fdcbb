//! High-level image operations.
//!
//! These functions combine calculations with backend execution.
//! They take configuration, compute parameters, and call the backend.

use super::backend::{BackendError, ImageBackend};
use super::calculations::calculate_bounded_dimensions;
use super::params::{EncodeFormat, Quality, ResizeParams};
use crate::types::UploadFile;
use chrono::Utc;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Configuration for the pre-upload resize step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrepareConfig {
    pub max_width: u32,
    pub quality: Quality,
}

impl Default for PrepareConfig {
    fn default() -> Self {
        Self {
            max_width: 1920,
            quality: Quality::default(),
        }
    }
}

/// Plan the output dimensions for a source of the given size.
pub fn plan_resize(original: (u32, u32), config: &PrepareConfig) -> (u32, u32) {
    calculate_bounded_dimensions(original, config.max_width)
}

/// Shrink and recompress a file before it is uploaded.
///
/// Non-image files come back untouched. Images are always re-encoded at
/// `config.quality` in their declared format, scaled down first when wider
/// than `config.max_width`. The result keeps the original name and MIME type
/// and gets a fresh modification time.
pub fn prepare_image(
    backend: &impl ImageBackend,
    file: UploadFile,
    config: &PrepareConfig,
) -> Result<UploadFile> {
    if !file.is_image() {
        return Ok(file);
    }

    let format = EncodeFormat::from_mime(&file.mime).ok_or_else(|| {
        BackendError::Encoding(format!("no encoder for {} ({})", file.mime, file.name))
    })?;

    let dims = backend.identify(&file.bytes)?;
    let (width, height) = plan_resize((dims.width, dims.height), config);

    let bytes = backend.resize(&ResizeParams {
        source: &file.bytes,
        width,
        height,
        format,
        quality: config.quality,
    })?;

    tracing::debug!(
        name = %file.name,
        from = %format!("{}x{}", dims.width, dims.height),
        to = %format!("{width}x{height}"),
        before = file.bytes.len(),
        after = bytes.len(),
        "prepared image"
    );

    Ok(UploadFile {
        name: file.name,
        mime: file.mime,
        bytes,
        modified_at: Utc::now(),
    })
}
