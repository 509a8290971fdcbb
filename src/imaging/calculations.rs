//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Calculate the dimensions of an upload after bounding its width.
///
/// Images at or below `max_width` keep their size. Wider images are scaled so
/// the width equals `max_width` exactly and the height follows the original
/// aspect ratio, rounded to the nearest pixel (never below 1).
///
/// # Arguments
/// * `original` - Original image dimensions (width, height)
/// * `max_width` - Maximum allowed width in pixels
///
/// # Examples
/// ```
/// # use trilhos_admin::imaging::calculate_bounded_dimensions;
/// // 4000x3000 landscape → 1920x1440
/// assert_eq!(calculate_bounded_dimensions((4000, 3000), 1920), (1920, 1440));
///
/// // Already small enough → unchanged
/// assert_eq!(calculate_bounded_dimensions((800, 600), 1920), (800, 600));
/// ```
pub fn calculate_bounded_dimensions(original: (u32, u32), max_width: u32) -> (u32, u32) {
    let (orig_w, orig_h) = original;

    if orig_w <= max_width || orig_w == 0 {
        return original;
    }

    let ratio = max_width as f64 / orig_w as f64;
    let h = (orig_h as f64 * ratio).round().max(1.0) as u32;
    (max_width, h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landscape_is_scaled_to_max_width() {
        assert_eq!(calculate_bounded_dimensions((3840, 2160), 1920), (1920, 1080));
    }

    #[test]
    fn portrait_is_bounded_by_width_only() {
        // Tall images may stay taller than max_width; only width is bounded
        assert_eq!(calculate_bounded_dimensions((2400, 3600), 1920), (1920, 2880));
    }

    #[test]
    fn exact_max_width_is_untouched() {
        assert_eq!(calculate_bounded_dimensions((1920, 1281), 1920), (1920, 1281));
    }

    #[test]
    fn odd_ratio_rounds_to_nearest_pixel() {
        // 1001 * 1920 / 3001 = 640.43 → 640
        assert_eq!(calculate_bounded_dimensions((3001, 1001), 1920), (1920, 640));
        // 1003 * 1920 / 3001 = 641.71 → 642
        assert_eq!(calculate_bounded_dimensions((3001, 1003), 1920), (1920, 642));
    }

    #[test]
    fn extreme_panorama_keeps_at_least_one_pixel() {
        assert_eq!(calculate_bounded_dimensions((100_000, 10), 1920), (1920, 1));
    }

    #[test]
    fn proportionality_holds_within_one_pixel() {
        for (w, h) in [(1921, 1080), (2560, 1440), (5000, 3333), (7777, 1234)] {
            let (out_w, out_h) = calculate_bounded_dimensions((w, h), 1920);
            assert_eq!(out_w, 1920);
            let exact = h as f64 * 1920.0 / w as f64;
            assert!(
                (out_h as f64 - exact).abs() <= 1.0,
                "{w}x{h} → {out_w}x{out_h}, expected height ≈ {exact}"
            );
        }
    }
}
