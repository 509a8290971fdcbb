//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations upload preparation
//! needs: identify (read dimensions) and resize (decode, scale, re-encode).
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Everything works on in-memory bytes: an upload never touches the
//! local filesystem between the picker and the blob store.

use super::params::ResizeParams;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    /// The source bytes are not a decodable image.
    #[error("Decode failed: {0}")]
    Decode(String),
    /// The re-encoding step failed (or no encoder exists for the format).
    #[error("Encoding failed: {0}")]
    Encoding(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
pub trait ImageBackend: Send + Sync {
    /// Get image dimensions from encoded bytes.
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, BackendError>;

    /// Decode, scale to exactly `width`x`height`, and re-encode.
    fn resize(&self, params: &ResizeParams<'_>) -> Result<Vec<u8>, BackendError>;
}
