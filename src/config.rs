//! Configuration management for the gaze tracker

use crate::constants::{
    DEFAULT_IRIS_ZONE_FRACTION, DEFAULT_PITCH_MULTIPLIER, DEFAULT_SMOOTHING_WINDOW, DEFAULT_TARGET_SIZE,
    DEFAULT_UI_CHANNEL_CAPACITY, DEFAULT_YAW_MULTIPLIER,
};
use crate::eye_region::PartitionConfig;
use crate::face_detection::{DetectionParams, FaceSelection};
use crate::gaze::GazeDrive;
use crate::iris::Eye;
use crate::smoothing::GazeGains;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cascade file locations
    pub models: ModelConfig,

    /// Detection parameters
    pub detection: DetectionConfig,

    /// Eye window constants
    pub partition: PartitionConfig,

    /// Gaze angle and smoothing configuration
    pub gaze: GazeConfig,

    /// UI coordinate stream
    pub ui: UiConfig,
}

/// Haar cascade file paths
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Frontal face cascade
    pub face_cascade: PathBuf,

    /// Cascade used in the left eye window
    pub left_eye_cascade: PathBuf,

    /// Cascade used in the right eye window
    pub right_eye_cascade: PathBuf,
}

/// Face and eye detection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Longest side of the grayscale search image
    pub target_size: u32,

    /// Face kept when several are found
    pub face_selection: FaceSelection,

    /// Face cascade scan
    pub face: DetectionParams,

    /// Eye cascade scan
    pub eye: DetectionParams,

    /// Lower share of the eye box searched for the iris (0.0-1.0)
    pub iris_zone_fraction: f64,
}

/// Which eye stream drives the avatar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveMode {
    /// Left eye rotates both meshes
    #[default]
    LeadingLeft,
    /// Right eye rotates both meshes
    LeadingRight,
    /// Each eye rotates its own mesh
    PerEye,
}

impl From<DriveMode> for GazeDrive {
    fn from(mode: DriveMode) -> Self {
        match mode {
            DriveMode::LeadingLeft => Self::LeadingEye(Eye::Left),
            DriveMode::LeadingRight => Self::LeadingEye(Eye::Right),
            DriveMode::PerEye => Self::PerEye,
        }
    }
}

/// Gaze angle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GazeConfig {
    /// Gain on the horizontal iris offset
    pub yaw_multiplier: f64,

    /// Gain on the vertical iris offset
    pub pitch_multiplier: f64,

    /// Moving average window per eye and axis
    pub window_size: usize,

    /// Mapping from eye streams to meshes
    pub drive: DriveMode,
}

/// UI coordinate stream configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Publish eye coordinates for display
    pub enabled: bool,

    /// Pending updates kept per eye
    pub channel_capacity: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            face_cascade: PathBuf::from("assets/haarcascade_frontalface_alt2.xml"),
            left_eye_cascade: PathBuf::from("assets/haarcascade_lefteye_2splits.xml"),
            right_eye_cascade: PathBuf::from("assets/haarcascade_righteye_2splits.xml"),
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            target_size: DEFAULT_TARGET_SIZE,
            face_selection: FaceSelection::Largest,
            face: DetectionParams::face(),
            eye: DetectionParams::eye(),
            iris_zone_fraction: DEFAULT_IRIS_ZONE_FRACTION,
        }
    }
}

impl Default for GazeConfig {
    fn default() -> Self {
        Self {
            yaw_multiplier: DEFAULT_YAW_MULTIPLIER,
            pitch_multiplier: DEFAULT_PITCH_MULTIPLIER,
            window_size: DEFAULT_SMOOTHING_WINDOW,
            drive: DriveMode::LeadingLeft,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            channel_capacity: DEFAULT_UI_CHANNEL_CAPACITY,
        }
    }
}

impl GazeConfig {
    #[must_use]
    pub fn gains(&self) -> GazeGains {
        GazeGains {
            yaw: self.yaw_multiplier,
            pitch: self.pitch_multiplier,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.detection.target_size == 0 {
            return Err(Error::ConfigError("Target size must be greater than 0".to_string()));
        }
        for (name, params) in [("Face", &self.detection.face), ("Eye", &self.detection.eye)] {
            if !(params.scale_factor.is_finite() && params.scale_factor > 1.0) {
                return Err(Error::ConfigError(format!("{name} scale factor must be greater than 1.0")));
            }
            if params.min_neighbors < 0 {
                return Err(Error::ConfigError(format!("{name} min neighbors must not be negative")));
            }
        }
        if !(self.detection.iris_zone_fraction > 0.0 && self.detection.iris_zone_fraction <= 1.0) {
            return Err(Error::ConfigError("Iris zone fraction must be in (0.0, 1.0]".to_string()));
        }

        self.partition.validate()?;

        if !(self.gaze.yaw_multiplier.is_finite() && self.gaze.pitch_multiplier.is_finite()) {
            return Err(Error::ConfigError("Gaze multipliers must be finite".to_string()));
        }
        if self.gaze.window_size == 0 {
            return Err(Error::ConfigError("Smoothing window size must be greater than 0".to_string()));
        }
        if self.ui.channel_capacity == 0 {
            return Err(Error::ConfigError("UI channel capacity must be greater than 0".to_string()));
        }

        Ok(())
    }

    /// Cascade files that do not exist on disk
    ///
    /// A missing cascade disables the stages that depend on it rather than
    /// failing the whole session.
    #[must_use]
    pub fn missing_models(&self) -> Vec<&Path> {
        [
            &self.models.face_cascade,
            &self.models.left_eye_cascade,
            &self.models.right_eye_cascade,
        ]
        .into_iter()
        .filter(|path| !path.exists())
        .map(PathBuf::as_path)
        .collect()
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Mirror gaze configuration

# Haar cascade files
models:
  face_cascade: "assets/haarcascade_frontalface_alt2.xml"
  left_eye_cascade: "assets/haarcascade_lefteye_2splits.xml"
  right_eye_cascade: "assets/haarcascade_righteye_2splits.xml"

# Detection parameters
detection:
  target_size: 600
  face_selection: largest
  face:
    scale_factor: 1.1
    min_neighbors: 3
    min_size: [0, 0]
    biggest_only: false
  eye:
    scale_factor: 1.15
    min_neighbors: 2
    min_size: [30, 30]
    biggest_only: true
  iris_zone_fraction: 0.6

# Eye window constants
partition:
  top_divisor: 4.0
  height_divisor: 4.0
  margin_divisor: 7

# Gaze angles
gaze:
  yaw_multiplier: 5.0
  pitch_multiplier: 1.0
  window_size: 3
  drive: leading_left

# UI coordinate stream
ui:
  enabled: true
  channel_capacity: 4
"#;
