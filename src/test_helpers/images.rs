//! Encoded test images, generated in memory.
//!
//! Depends only on the `image` crate so `tests/` can include it by path
//! alongside the unit tests.

use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;

fn gradient(width: u32, height: u32) -> DynamicImage {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    });
    DynamicImage::ImageRgb8(img)
}

fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

/// A valid JPEG of the given size.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(&gradient(width, height), ImageFormat::Jpeg)
}

/// A valid PNG of the given size.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(&gradient(width, height), ImageFormat::Png)
}

/// A valid JPEG grown to at least `target_len` bytes with comment (COM)
/// segments inserted right after SOI. Decoders skip the padding, so this is
/// a cheap way to get a file over the upload size limit.
pub fn padded_jpeg(width: u32, height: u32, target_len: usize) -> Vec<u8> {
    const MAX_PAYLOAD: usize = 65_533;

    let jpeg = jpeg_bytes(width, height);
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "missing SOI");

    let mut out = Vec::with_capacity(target_len + MAX_PAYLOAD);
    out.extend_from_slice(&jpeg[..2]);
    let mut remaining = target_len.saturating_sub(jpeg.len());
    while remaining > 0 {
        let payload = remaining.min(MAX_PAYLOAD).max(1);
        let len = (payload + 2) as u16;
        out.extend_from_slice(&[0xFF, 0xFE]);
        out.extend_from_slice(&len.to_be_bytes());
        out.resize(out.len() + payload, b' ');
        remaining = remaining.saturating_sub(payload + 4);
    }
    out.extend_from_slice(&jpeg[2..]);
    out
}

#[test]
fn padded_jpeg_reaches_target_and_still_decodes() {
    let bytes = padded_jpeg(64, 32, 200_000);
    assert!(bytes.len() >= 200_000);
    let img = image::load_from_memory(&bytes).unwrap();
    assert_eq!((img.width(), img.height()), (64, 32));
}
