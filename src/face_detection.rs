//! Coarse face localisation on the grayscale search image.
//!
//! The scanning itself is delegated to an [`ObjectDetector`], a cascade-style
//! classifier that returns candidate boxes for one object class. With the
//! `opencv` feature enabled, [`crate::cascade::HaarCascade`] provides one
//! backed by `OpenCV`'s `CascadeClassifier`; tests plug in closures.

use crate::constants::{
    DEFAULT_EYE_MIN_NEIGHBORS, DEFAULT_EYE_MIN_SIZE, DEFAULT_EYE_SCALE_FACTOR, DEFAULT_FACE_MIN_NEIGHBORS,
    DEFAULT_FACE_SCALE_FACTOR,
};
use crate::geometry::Rect;
use crate::Result;
use image::GrayImage;
use log::debug;
use serde::{Deserialize, Serialize};

/// Multi-scale scan parameters passed to a detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionParams {
    /// Image pyramid step between scales (> 1.0)
    pub scale_factor: f64,

    /// Neighbouring hits needed to keep a candidate
    pub min_neighbors: i32,

    /// Smallest object reported, `(width, height)`
    pub min_size: (u32, u32),

    /// Report only the single largest object
    pub biggest_only: bool,
}

impl DetectionParams {
    /// Parameters used for whole-face scans
    #[must_use]
    pub fn face() -> Self {
        Self {
            scale_factor: DEFAULT_FACE_SCALE_FACTOR,
            min_neighbors: DEFAULT_FACE_MIN_NEIGHBORS,
            min_size: (0, 0),
            biggest_only: false,
        }
    }

    /// Parameters used for eye scans inside an eye window
    #[must_use]
    pub fn eye() -> Self {
        Self {
            scale_factor: DEFAULT_EYE_SCALE_FACTOR,
            min_neighbors: DEFAULT_EYE_MIN_NEIGHBORS,
            min_size: (DEFAULT_EYE_MIN_SIZE, DEFAULT_EYE_MIN_SIZE),
            biggest_only: true,
        }
    }
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self::face()
    }
}

/// Cascade-style object detector
///
/// Implementations return boxes in the coordinate space of `image`. An empty
/// vector means nothing was found and is not an error.
pub trait ObjectDetector: Send {
    /// Scan `image` and return candidate boxes
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying classifier fails
    fn detect(&mut self, image: &GrayImage, params: &DetectionParams) -> Result<Vec<Rect>>;
}

impl<F> ObjectDetector for F
where
    F: FnMut(&GrayImage, &DetectionParams) -> Result<Vec<Rect>> + Send,
{
    fn detect(&mut self, image: &GrayImage, params: &DetectionParams) -> Result<Vec<Rect>> {
        self(image, params)
    }
}

/// Which candidate to track when several faces are found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceSelection {
    /// First candidate in detector order
    First,
    /// Candidate with the largest area, earliest wins on ties
    #[default]
    Largest,
}

impl FaceSelection {
    /// Pick one face from a detection set
    #[must_use]
    pub fn select(self, faces: &[Rect]) -> Option<Rect> {
        match self {
            Self::First => faces.first().copied(),
            Self::Largest => faces
                .iter()
                .copied()
                .fold(None, |best: Option<Rect>, face| match best {
                    Some(current) if current.area() >= face.area() => Some(current),
                    _ => Some(face),
                }),
        }
    }
}

/// Face detector: a cascade plus the policy for choosing among its hits
pub struct FaceRegionDetector {
    detector: Box<dyn ObjectDetector>,
    params: DetectionParams,
    selection: FaceSelection,
}

impl FaceRegionDetector {
    /// Create a face detector around a cascade
    #[must_use]
    pub fn new(detector: Box<dyn ObjectDetector>, params: DetectionParams, selection: FaceSelection) -> Self {
        Self {
            detector,
            params,
            selection,
        }
    }

    /// Detect faces in a grayscale image, clipped to its bounds
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying detector fails
    pub fn detect(&mut self, gray: &GrayImage) -> Result<Vec<Rect>> {
        let faces: Vec<Rect> = self
            .detector
            .detect(gray, &self.params)?
            .into_iter()
            .map(|face| face.clip_to(gray.width(), gray.height()))
            .filter(|face| !face.is_empty())
            .collect();

        debug!("Face detector returned {} candidate(s)", faces.len());
        Ok(faces)
    }

    /// Detect faces and keep the one chosen by the selection policy
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying detector fails
    pub fn detect_one(&mut self, gray: &GrayImage) -> Result<Option<Rect>> {
        let faces = self.detect(gray)?;
        Ok(self.selection.select(&faces))
    }

    #[must_use]
    pub fn selection(&self) -> FaceSelection {
        self.selection
    }
}
