//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between [`operations`](super::operations) (which decides whether
//! and how far to shrink an upload) and the [`backend`](super::backend) (which
//! does the pixel work), so a mock backend can stand in during tests.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 85). Clamped on construction.
//! - [`EncodeFormat`]: Output codec, always the same as the input's declared MIME type.
//! - [`ResizeParams`]: Everything one re-encode needs: source bytes, target dimensions, codec, quality.

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    /// Build from a `0.0..=1.0` factor, the way browsers express it (`0.85` → 85).
    pub fn from_fraction(factor: f32) -> Self {
        Self::new((factor.clamp(0.0, 1.0) * 100.0).round() as u32)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(85)
    }
}

/// Codecs the preparation step can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeFormat {
    Jpeg,
    Png,
    WebP,
}

impl EncodeFormat {
    /// Map a declared MIME type to its encoder. `None` means no encoder is compiled in.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
        }
    }
}

/// Parameters for a resize + re-encode of an in-memory image.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams<'a> {
    pub source: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub format: EncodeFormat,
    pub quality: Quality,
}
