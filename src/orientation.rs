//! Device rotation handling: search-image preparation and coordinate remap.
//!
//! The sensor buffer keeps its own axes whatever way the device is held, so
//! each frame the grayscale image is downscaled and turned upright before the
//! cascades run. Everything the detectors report is then in *search space*.
//! Going back to *frame space* (full-resolution sensor buffer) is two fixed
//! steps in a fixed order: undo the scale, then undo the rotation. The
//! rotation step mirrors against the frame's unscaled width or height.
//!
//! | bucket | search → frame            | frame → search            |
//! |--------|---------------------------|---------------------------|
//! | 0°     | `(y, x)`                  | `(y, x)`                  |
//! | 90°    | `(x, y)`                  | `(x, y)`                  |
//! | 180°   | `(W - y, x)`              | `(y, W - x)`              |
//! | 270°   | `(x, H - y)`              | `(x, H - y)`              |

use crate::geometry::{Point, Rect};
use crate::utils::safe_cast::{f64_to_i32_trunc, scaled_dimension, u32_to_i32};
use crate::{Error, Result};
use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer};
use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

/// Coarse device orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RotationBucket {
    #[default]
    #[serde(rename = "0")]
    Deg0,
    #[serde(rename = "90")]
    Deg90,
    #[serde(rename = "180")]
    Deg180,
    #[serde(rename = "270")]
    Deg270,
}

impl RotationBucket {
    pub const ALL: [Self; 4] = [Self::Deg0, Self::Deg90, Self::Deg180, Self::Deg270];

    #[must_use]
    pub const fn degrees(self) -> u16 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// Parse an exact bucket angle
    ///
    /// # Errors
    ///
    /// Returns an error for any angle other than 0, 90, 180 or 270
    pub fn from_degrees(degrees: u16) -> Result<Self> {
        match degrees {
            0 => Ok(Self::Deg0),
            90 => Ok(Self::Deg90),
            180 => Ok(Self::Deg180),
            270 => Ok(Self::Deg270),
            other => Err(Error::InvalidInput(format!("Unsupported rotation: {other} degrees"))),
        }
    }

    /// Map a point from search space (upright, unscaled) to frame space
    #[must_use]
    pub fn to_frame_point(self, point: Point, frame_width: f64, frame_height: f64) -> Point {
        match self {
            Self::Deg0 => Point::new(point.y, point.x),
            Self::Deg90 => point,
            Self::Deg180 => Point::new(frame_width - point.y, point.x),
            Self::Deg270 => Point::new(point.x, frame_height - point.y),
        }
    }

    /// Inverse of [`Self::to_frame_point`]
    #[must_use]
    pub fn from_frame_point(self, point: Point, frame_width: f64, frame_height: f64) -> Point {
        match self {
            Self::Deg0 => Point::new(point.y, point.x),
            Self::Deg90 => point,
            Self::Deg180 => Point::new(point.y, frame_width - point.x),
            Self::Deg270 => Point::new(point.x, frame_height - point.y),
        }
    }

    /// Map a box from search space (upright, unscaled) to frame space
    #[must_use]
    pub fn to_frame_rect(self, rect: Rect, frame_width: i32, frame_height: i32) -> Rect {
        match self {
            Self::Deg0 => Rect::new(rect.y, rect.x, rect.height, rect.width),
            Self::Deg90 => rect,
            Self::Deg180 => Rect::new(frame_width - rect.bottom(), rect.x, rect.height, rect.width),
            Self::Deg270 => Rect::new(rect.x, frame_height - rect.bottom(), rect.width, rect.height),
        }
    }

    /// Inverse of [`Self::to_frame_rect`]
    #[must_use]
    pub fn from_frame_rect(self, rect: Rect, frame_width: i32, frame_height: i32) -> Rect {
        match self {
            Self::Deg0 => Rect::new(rect.y, rect.x, rect.height, rect.width),
            Self::Deg90 => rect,
            Self::Deg180 => Rect::new(rect.y, frame_width - rect.right(), rect.height, rect.width),
            Self::Deg270 => Rect::new(rect.x, frame_height - rect.bottom(), rect.width, rect.height),
        }
    }

    /// Turn a sensor-oriented image upright for this bucket
    #[must_use]
    pub fn make_upright(self, image: &GrayImage) -> GrayImage {
        let (width, height) = image.dimensions();
        match self {
            Self::Deg0 => ImageBuffer::from_fn(height, width, |x, y| *image.get_pixel(y, x)),
            Self::Deg90 => image.clone(),
            Self::Deg180 => imageops::rotate270(image),
            Self::Deg270 => imageops::flip_vertical(image),
        }
    }
}

impl fmt::Display for RotationBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Shared, lock-free holder for the current rotation bucket
///
/// The orientation service stores, the capture thread loads once per frame.
/// Only the latest value matters.
#[derive(Debug, Clone, Default)]
pub struct RotationHandle {
    degrees: Arc<AtomicU16>,
}

impl RotationHandle {
    #[must_use]
    pub fn new(initial: RotationBucket) -> Self {
        Self {
            degrees: Arc::new(AtomicU16::new(initial.degrees())),
        }
    }

    /// Publish a new bucket; last write wins
    pub fn set(&self, bucket: RotationBucket) {
        let previous = self.degrees.swap(bucket.degrees(), Ordering::Relaxed);
        if previous != bucket.degrees() {
            info!("Rotation changed from {previous}° to {bucket}");
        }
    }

    /// Read the current bucket
    #[must_use]
    pub fn get(&self) -> RotationBucket {
        RotationBucket::from_degrees(self.degrees.load(Ordering::Relaxed)).unwrap_or_default()
    }
}

/// Downscale ratio keeping the longest side at most `target` pixels
#[must_use]
pub fn scale_ratio(target: u32, width: u32, height: u32) -> f64 {
    let longest = width.max(height);
    if longest <= target || longest == 0 {
        1.0
    } else {
        f64::from(target) / f64::from(longest)
    }
}

/// Per-frame coordinate adapter between search space and frame space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationAdapter {
    bucket: RotationBucket,
    ratio: f64,
    frame_width: u32,
    frame_height: u32,
}

impl OrientationAdapter {
    /// Adapter for a frame of the given size, choosing the ratio from `target`
    #[must_use]
    pub fn new(bucket: RotationBucket, target: u32, frame_width: u32, frame_height: u32) -> Self {
        Self::with_ratio(bucket, scale_ratio(target, frame_width, frame_height), frame_width, frame_height)
    }

    /// Adapter with an explicit ratio
    #[must_use]
    pub fn with_ratio(bucket: RotationBucket, ratio: f64, frame_width: u32, frame_height: u32) -> Self {
        Self {
            bucket,
            ratio,
            frame_width,
            frame_height,
        }
    }

    #[must_use]
    pub fn bucket(&self) -> RotationBucket {
        self.bucket
    }

    #[must_use]
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Downscale the grayscale buffer and turn it upright
    #[must_use]
    pub fn search_image(&self, gray: &GrayImage) -> GrayImage {
        if (self.ratio - 1.0).abs() < f64::EPSILON {
            self.bucket.make_upright(gray)
        } else {
            let width = scaled_dimension(gray.width(), self.ratio);
            let height = scaled_dimension(gray.height(), self.ratio);
            let scaled = imageops::resize(gray, width, height, FilterType::Triangle);
            self.bucket.make_upright(&scaled)
        }
    }

    /// Undo the downscale of a search-space point
    #[must_use]
    pub fn unscale_point(&self, point: Point) -> Point {
        Point::new(point.x / self.ratio, point.y / self.ratio)
    }

    /// Undo the downscale of a search-space box
    #[must_use]
    pub fn unscale_rect(&self, rect: Rect) -> Rect {
        let scale = |value: i32| f64_to_i32_trunc(f64::from(value) / self.ratio);
        Rect::new(scale(rect.x), scale(rect.y), scale(rect.width), scale(rect.height))
    }

    /// Search space → frame space: unscale, then remap rotation
    #[must_use]
    pub fn to_frame_point(&self, point: Point) -> Point {
        self.bucket.to_frame_point(
            self.unscale_point(point),
            f64::from(self.frame_width),
            f64::from(self.frame_height),
        )
    }

    /// Search space → frame space: unscale, then remap rotation
    ///
    /// # Errors
    ///
    /// Returns an error if the frame size does not fit in `i32`
    pub fn to_frame_rect(&self, rect: Rect) -> Result<Rect> {
        Ok(self.bucket.to_frame_rect(
            self.unscale_rect(rect),
            u32_to_i32(self.frame_width)?,
            u32_to_i32(self.frame_height)?,
        ))
    }
}
