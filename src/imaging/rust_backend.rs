//! Pure Rust image backend built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, WebP) | `image` crate decoders, format sniffed from the bytes |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder::new_with_quality` |
//! | Encode → PNG | `image::codecs::png::PngEncoder` |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder::new_lossless` |
//!
//! The pure-Rust WebP and PNG encoders are lossless, so quality only changes
//! the size of JPEG output.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::{EncodeFormat, Quality, ResizeParams};
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::io::Cursor;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn reader(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, BackendError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| BackendError::Decode(format!("Failed to sniff image format: {e}")))
}

/// Decode an image from memory.
fn load_image(bytes: &[u8]) -> Result<DynamicImage, BackendError> {
    reader(bytes)?
        .decode()
        .map_err(|e| BackendError::Decode(format!("Failed to decode image: {e}")))
}

/// Encode a DynamicImage into the requested codec.
fn encode_image(
    img: &DynamicImage,
    format: EncodeFormat,
    quality: Quality,
) -> Result<Vec<u8>, BackendError> {
    let mut out = Vec::new();
    let result = match format {
        EncodeFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            let percent = u8::try_from(quality.value()).unwrap_or(100);
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, percent);
            rgb.write_with_encoder(encoder)
        }
        EncodeFormat::Png => {
            let encoder = image::codecs::png::PngEncoder::new(&mut out);
            img.write_with_encoder(encoder)
        }
        EncodeFormat::WebP => {
            let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
            let encoder = image::codecs::webp::WebPEncoder::new_lossless(&mut out);
            rgba.write_with_encoder(encoder)
        }
    };
    result.map_err(|e| BackendError::Encoding(format!("{format:?} encode failed: {e}")))?;
    Ok(out)
}

impl ImageBackend for RustBackend {
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, BackendError> {
        let (width, height) = reader(bytes)?
            .into_dimensions()
            .map_err(|e| BackendError::Decode(format!("Failed to read dimensions: {e}")))?;
        Ok(Dimensions { width, height })
    }

    fn resize(&self, params: &ResizeParams<'_>) -> Result<Vec<u8>, BackendError> {
        let img = load_image(params.source)?;
        let resized = if img.width() == params.width && img.height() == params.height {
            img
        } else {
            img.resize_exact(params.width, params.height, FilterType::Lanczos3)
        };
        encode_image(&resized, params.format, params.quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{jpeg_bytes, png_bytes};

    #[test]
    fn identify_synthetic_jpeg() {
        let backend = RustBackend::new();
        let dims = backend.identify(&jpeg_bytes(200, 150)).unwrap();
        assert_eq!(dims.width, 200);
        assert_eq!(dims.height, 150);
    }

    #[test]
    fn identify_garbage_is_decode_error() {
        let backend = RustBackend::new();
        let result = backend.identify(b"definitely not an image");
        assert!(matches!(result, Err(BackendError::Decode(_))));
    }

    #[test]
    fn resize_jpeg_produces_requested_dimensions() {
        let backend = RustBackend::new();
        let source = jpeg_bytes(400, 300);
        let out = backend
            .resize(&ResizeParams {
                source: &source,
                width: 200,
                height: 150,
                format: EncodeFormat::Jpeg,
                quality: Quality::new(85),
            })
            .unwrap();

        let dims = backend.identify(&out).unwrap();
        assert_eq!((dims.width, dims.height), (200, 150));
    }

    #[test]
    fn lower_quality_gives_smaller_jpeg() {
        let backend = RustBackend::new();
        let source = jpeg_bytes(320, 240);
        let encode = |q| {
            backend
                .resize(&ResizeParams {
                    source: &source,
                    width: 320,
                    height: 240,
                    format: EncodeFormat::Jpeg,
                    quality: Quality::new(q),
                })
                .unwrap()
                .len()
        };
        assert!(encode(20) < encode(95));
        assert_eq!(encode(300), encode(100));
    }

    #[test]
    fn png_keeps_format() {
        let backend = RustBackend::new();
        let source = png_bytes(64, 48);
        let out = backend
            .resize(&ResizeParams {
                source: &source,
                width: 32,
                height: 24,
                format: EncodeFormat::Png,
                quality: Quality::default(),
            })
            .unwrap();
        assert_eq!(
            image::guess_format(&out).unwrap(),
            image::ImageFormat::Png
        );
    }

    #[test]
    fn webp_output_is_decodable() {
        let backend = RustBackend::new();
        let source = png_bytes(40, 40);
        let out = backend
            .resize(&ResizeParams {
                source: &source,
                width: 20,
                height: 20,
                format: EncodeFormat::WebP,
                quality: Quality::default(),
            })
            .unwrap();
        let dims = backend.identify(&out).unwrap();
        assert_eq!((dims.width, dims.height), (20, 20));
    }

    #[test]
    fn resize_garbage_is_decode_error() {
        let backend = RustBackend::new();
        let result = backend.resize(&ResizeParams {
            source: b"nope",
            width: 10,
            height: 10,
            format: EncodeFormat::Jpeg,
            quality: Quality::default(),
        });
        assert!(matches!(result, Err(BackendError::Decode(_))));
    }
}
