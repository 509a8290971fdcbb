//! Image preparation: pure Rust, no system codecs.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::ImageReader::into_dimensions` (header only) |
//! | **Resize** | `resize_exact` with `Lanczos3` |
//! | **Re-encode** | JPEG at the requested quality; PNG and WebP lossless |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: [`prepare_image`], the step that runs before every upload

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::calculate_bounded_dimensions;
pub use operations::{PrepareConfig, plan_resize, prepare_image};
pub use params::{EncodeFormat, Quality, ResizeParams};
pub use rust_backend::RustBackend;
