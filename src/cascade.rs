//! Haar cascade detectors backed by `OpenCV`.

use crate::config::Config;
use crate::face_detection::{DetectionParams, FaceRegionDetector, ObjectDetector};
use crate::geometry::Rect;
use crate::iris::IrisLocalizer;
use crate::pipeline::Detectors;
use crate::utils::safe_cast::u32_to_i32;
use crate::{Error, Result};
use image::GrayImage;
use log::{info, warn};
use opencv::{
    core::{Mat, Size, Vector},
    objdetect::{self, CascadeClassifier},
    prelude::*,
};
use std::path::Path;

/// `OpenCV` cascade classifier loaded from an XML model
pub struct HaarCascade {
    classifier: CascadeClassifier,
}

impl HaarCascade {
    /// Load a cascade from disk
    ///
    /// # Errors
    ///
    /// Returns `DetectorUnavailable` if the file is missing or holds no cascade
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let Some(path_str) = path.to_str() else {
            return Err(Error::DetectorUnavailable(format!("Non UTF-8 path: {}", path.display())));
        };
        if !path.exists() {
            return Err(Error::DetectorUnavailable(format!("Cascade not found: {path_str}")));
        }

        let classifier = CascadeClassifier::new(path_str)?;
        if classifier.empty()? {
            return Err(Error::DetectorUnavailable(format!("Failed to load cascade: {path_str}")));
        }
        info!("Loaded cascade {path_str}");
        Ok(Self { classifier })
    }
}

impl ObjectDetector for HaarCascade {
    fn detect(&mut self, image: &GrayImage, params: &DetectionParams) -> Result<Vec<Rect>> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(Vec::new());
        }
        let mat = gray_to_mat(image)?;

        let mut flags = objdetect::CASCADE_SCALE_IMAGE;
        if params.biggest_only {
            flags |= objdetect::CASCADE_FIND_BIGGEST_OBJECT;
        }
        let min_size = Size::new(u32_to_i32(params.min_size.0)?, u32_to_i32(params.min_size.1)?);

        let mut found = Vector::<opencv::core::Rect>::new();
        self.classifier.detect_multi_scale(
            &mat,
            &mut found,
            params.scale_factor,
            params.min_neighbors,
            flags,
            min_size,
            Size::new(0, 0),
        )?;

        Ok(found
            .iter()
            .map(|r| Rect::new(r.x, r.y, r.width, r.height))
            .collect())
    }
}

fn gray_to_mat(image: &GrayImage) -> Result<Mat> {
    let width = usize::try_from(image.width())
        .map_err(|_| Error::InvalidInput("Image too wide".to_string()))?;
    let rows: Vec<&[u8]> = image.as_raw().chunks(width).collect();
    Ok(Mat::from_slice_2d(&rows)?)
}

fn load(path: &Path) -> Option<HaarCascade> {
    match HaarCascade::from_file(path) {
        Ok(cascade) => Some(cascade),
        Err(e) => {
            warn!("{e}");
            None
        }
    }
}

/// Load every cascade named in `config`; failures disable their stage
#[must_use]
pub fn load_detectors(config: &Config) -> Detectors {
    let detection = &config.detection;
    let localizer = |path: &Path| {
        load(path).map(|cascade| {
            IrisLocalizer::with_params(Box::new(cascade), detection.eye.clone(), detection.iris_zone_fraction)
        })
    };

    Detectors {
        face: load(&config.models.face_cascade).map(|cascade| {
            FaceRegionDetector::new(Box::new(cascade), detection.face.clone(), detection.face_selection)
        }),
        left_eye: localizer(config.models.left_eye_cascade.as_path()),
        right_eye: localizer(config.models.right_eye_cascade.as_path()),
    }
}
