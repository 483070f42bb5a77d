//! Utility functions shared by the pipeline stages.

pub mod safe_cast;

use image::GrayImage;

/// Locate the darkest pixel of a grayscale image
///
/// Scans in row-major order and keeps the first pixel holding the minimum,
/// so identical input always yields the same location. Returns `None` for
/// an empty image.
#[must_use]
pub fn darkest_pixel(image: &GrayImage) -> Option<(u32, u32)> {
    image
        .enumerate_pixels()
        .fold(None, |best: Option<(u32, u32, u8)>, (x, y, pixel)| match best {
            Some((_, _, value)) if value <= pixel[0] => best,
            _ => Some((x, y, pixel[0])),
        })
        .map(|(x, y, _)| (x, y))
}
