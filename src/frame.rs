//! Per-tick image data handed from the frame source to the pipeline.

use crate::geometry::Rect;
use crate::utils::safe_cast::i32_to_u32_clamp;
use crate::{Error, Result};
use image::{imageops, DynamicImage, GenericImageView, GrayImage, RgbaImage, SubImage};

/// One captured frame: color and grayscale views of the same sensor buffer
#[derive(Debug, Clone)]
pub struct Frame {
    color: RgbaImage,
    gray: GrayImage,
}

impl Frame {
    /// Build a frame from matching color and grayscale buffers
    ///
    /// # Errors
    ///
    /// Returns an error if the two buffers disagree in size or are empty
    pub fn new(color: RgbaImage, gray: GrayImage) -> Result<Self> {
        if color.dimensions() != gray.dimensions() {
            return Err(Error::InvalidInput(format!(
                "Color buffer {:?} and gray buffer {:?} differ in size",
                color.dimensions(),
                gray.dimensions()
            )));
        }
        if gray.width() == 0 || gray.height() == 0 {
            return Err(Error::InvalidInput("Frame has zero size".to_string()));
        }
        Ok(Self { color, gray })
    }

    /// Build a frame from a color buffer, deriving the grayscale view
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is empty
    pub fn from_color(color: RgbaImage) -> Result<Self> {
        let gray = imageops::grayscale(&color);
        Self::new(color, gray)
    }

    /// Build a frame from a grayscale buffer, deriving the color view
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is empty
    pub fn from_gray(gray: GrayImage) -> Result<Self> {
        let color = DynamicImage::ImageLuma8(gray.clone()).to_rgba8();
        Self::new(color, gray)
    }

    /// Build a frame from any decoded image
    ///
    /// # Errors
    ///
    /// Returns an error if the image is empty
    pub fn from_dynamic(image: &DynamicImage) -> Result<Self> {
        Self::new(image.to_rgba8(), image.to_luma8())
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.gray.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.gray.height()
    }

    #[must_use]
    pub fn color(&self) -> &RgbaImage {
        &self.color
    }

    #[must_use]
    pub fn gray(&self) -> &GrayImage {
        &self.gray
    }
}

/// Borrow a clipped sub-view of a grayscale buffer, `None` when the clipped
/// region is empty
#[must_use]
pub fn crop_gray<'a>(image: &'a GrayImage, rect: &Rect) -> Option<SubImage<&'a GrayImage>> {
    let clipped = rect.clip_to(image.width(), image.height());
    if clipped.is_empty() {
        return None;
    }
    Some(image.view(
        i32_to_u32_clamp(clipped.x),
        i32_to_u32_clamp(clipped.y),
        i32_to_u32_clamp(clipped.width),
        i32_to_u32_clamp(clipped.height),
    ))
}
