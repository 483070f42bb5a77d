//! Iris localisation inside one eye search window.
//!
//! An eye cascade runs on the window crop and keeps its single best hit.
//! The upper part of that box holds the eyebrow and lid, so only its lower
//! share is searched: the darkest pixel there is taken as the pupil, and the
//! zone's center as the resting eye position.

use crate::constants::DEFAULT_IRIS_ZONE_FRACTION;
use crate::face_detection::{DetectionParams, ObjectDetector};
use crate::frame::crop_gray;
use crate::geometry::{Point, Rect};
use crate::utils::darkest_pixel;
use crate::utils::safe_cast::{f64_to_i32_trunc, u32_to_i32};
use crate::Result;
use image::GrayImage;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which of the subject's eyes a sample belongs to
///
/// Facing the camera, the subject's right eye appears at the smaller x.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    pub const BOTH: [Self; 2] = [Self::Left, Self::Right];

    /// Stable index for per-eye arrays
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Left => 0,
            Self::Right => 1,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl fmt::Display for Eye {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Eye center and iris location found in one window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IrisObservation {
    /// Box returned by the eye cascade, in parent coordinates
    pub eye_box: Rect,
    /// Lower part of `eye_box` searched for the pupil
    pub search_zone: Rect,
    /// Geometric center of `search_zone`
    pub eye_center: Point,
    /// Darkest pixel of `search_zone`
    pub iris: Point,
}

/// One eye's observation tagged with the eye it came from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeSample {
    pub eye: Eye,
    pub eye_center: Point,
    pub iris: Point,
}

impl EyeSample {
    #[must_use]
    pub fn new(eye: Eye, observation: &IrisObservation) -> Self {
        Self {
            eye,
            eye_center: observation.eye_center,
            iris: observation.iris,
        }
    }
}

/// Per-eye localiser: an eye cascade plus the darkest-point search
pub struct IrisLocalizer {
    detector: Box<dyn ObjectDetector>,
    params: DetectionParams,
    zone_fraction: f64,
}

impl IrisLocalizer {
    /// Create a localiser using the default eye scan parameters
    #[must_use]
    pub fn new(detector: Box<dyn ObjectDetector>) -> Self {
        Self::with_params(detector, DetectionParams::eye(), DEFAULT_IRIS_ZONE_FRACTION)
    }

    /// Create a localiser with explicit scan parameters and zone share
    #[must_use]
    pub fn with_params(detector: Box<dyn ObjectDetector>, params: DetectionParams, zone_fraction: f64) -> Self {
        Self {
            detector,
            params,
            zone_fraction: zone_fraction.clamp(0.0, 1.0),
        }
    }

    /// Locate eye center and iris inside `window` of `gray`
    ///
    /// Returns `Ok(None)` when the window is empty, the eye cascade finds
    /// nothing, or the search zone degenerates.
    ///
    /// # Errors
    ///
    /// Returns an error if the eye cascade fails
    pub fn locate(&mut self, gray: &GrayImage, window: &Rect) -> Result<Option<IrisObservation>> {
        let window = window.clip_to(gray.width(), gray.height());
        let Some(view) = crop_gray(gray, &window) else {
            debug!("Eye window {window:?} is empty, skipping");
            return Ok(None);
        };
        let crop = view.to_image();

        let candidates = self.detector.detect(&crop, &self.params)?;
        let Some(best) = self.best_candidate(&candidates) else {
            return Ok(None);
        };

        let eye_box = best.translate(window.x, window.y).clip_to(gray.width(), gray.height());
        let search_zone = iris_search_zone(&eye_box, self.zone_fraction);
        let Some(zone_view) = crop_gray(gray, &search_zone) else {
            return Ok(None);
        };
        let Some((dx, dy)) = darkest_pixel(&zone_view.to_image()) else {
            return Ok(None);
        };

        let iris = Point::new(
            f64::from(search_zone.x + u32_to_i32(dx)?),
            f64::from(search_zone.y + u32_to_i32(dy)?),
        );
        let eye_center = search_zone.center();
        debug!("Iris at ({:.1}, {:.1}), eye center ({:.1}, {:.1})", iris.x, iris.y, eye_center.x, eye_center.y);

        Ok(Some(IrisObservation {
            eye_box,
            search_zone,
            eye_center,
            iris,
        }))
    }

    fn best_candidate(&self, candidates: &[Rect]) -> Option<Rect> {
        let (min_width, min_height) = self.params.min_size;
        let mut eligible = candidates.iter().copied().filter(|candidate| {
            !candidate.is_empty()
                && i64::from(candidate.width) >= i64::from(min_width)
                && i64::from(candidate.height) >= i64::from(min_height)
        });
        if self.params.biggest_only {
            eligible.fold(None, |best: Option<Rect>, candidate| match best {
                Some(current) if current.area() >= candidate.area() => Some(current),
                _ => Some(candidate),
            })
        } else {
            eligible.next()
        }
    }
}

/// Lower `fraction` of an eye box, where the iris sits
#[must_use]
pub fn iris_search_zone(eye_box: &Rect, fraction: f64) -> Rect {
    let height = f64::from(eye_box.height);
    Rect::new(
        eye_box.x,
        eye_box.y + f64_to_i32_trunc(height * (1.0 - fraction)),
        eye_box.width,
        f64_to_i32_trunc(height * fraction),
    )
}
