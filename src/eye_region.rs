//! Eye search windows derived from a face box.
//!
//! A horizontal band is cut a fixed fraction of the way down the face. A
//! margin is reserved on both outer edges and the rest is split exactly in
//! half, so the two windows meet at the nose bridge but never overlap.
//! Windows are named after the subject's eyes. Facing the camera, the
//! subject's right eye appears at the smaller x.

use crate::constants::{DEFAULT_HEIGHT_DIVISOR, DEFAULT_MARGIN_DIVISOR, DEFAULT_TOP_DIVISOR};
use crate::geometry::Rect;
use crate::utils::safe_cast::f64_to_i32_trunc;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Fractional constants of the partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    /// Band starts at `y + h / top_divisor`
    pub top_divisor: f64,

    /// Band height is `h / height_divisor`
    pub height_divisor: f64,

    /// `w / margin_divisor` is reserved on each outer edge
    pub margin_divisor: i32,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            top_divisor: DEFAULT_TOP_DIVISOR,
            height_divisor: DEFAULT_HEIGHT_DIVISOR,
            margin_divisor: DEFAULT_MARGIN_DIVISOR,
        }
    }
}

impl PartitionConfig {
    /// Check that the band fits inside the face and the margins leave room
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the first bad constant
    pub fn validate(&self) -> Result<()> {
        if !(self.top_divisor.is_finite() && self.top_divisor > 1.0) {
            return Err(Error::ConfigError("Top divisor must be greater than 1.0".to_string()));
        }
        if !(self.height_divisor.is_finite() && self.height_divisor > 1.0) {
            return Err(Error::ConfigError("Height divisor must be greater than 1.0".to_string()));
        }
        if 1.0 / self.top_divisor + 1.0 / self.height_divisor > 1.0 {
            return Err(Error::ConfigError("Eye band extends below the face".to_string()));
        }
        if self.margin_divisor <= 2 {
            return Err(Error::ConfigError("Margin divisor must be greater than 2".to_string()));
        }
        Ok(())
    }
}

/// The two eye search windows of one face
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EyeWindows {
    /// Subject's left eye, the window with the larger x
    pub left: Rect,
    /// Subject's right eye, the window with the smaller x
    pub right: Rect,
}

/// Split a face box into two eye search windows
///
/// Deterministic and side-effect free. Degenerate faces yield empty windows,
/// which the iris localiser treats as "nothing found".
#[must_use]
pub fn partition(face: &Rect, config: &PartitionConfig) -> EyeWindows {
    let margin = face.width / config.margin_divisor.max(1);
    let half = ((face.width - 2 * margin) / 2).max(0);
    let top = face.y + f64_to_i32_trunc(f64::from(face.height) / config.top_divisor);
    let height = f64_to_i32_trunc(f64::from(face.height) / config.height_divisor).max(0);

    EyeWindows {
        right: Rect::new(face.x + margin, top, half, height),
        left: Rect::new(face.x + margin + half, top, half, height),
    }
}
