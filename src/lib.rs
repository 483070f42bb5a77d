//! Gaze tracking library that drives the eyes of a 3-D avatar from a camera.
//!
//! The tracking pipeline consists of:
//! 1. Face detection on a downscaled, upright grayscale frame
//! 2. Splitting the face box into two eye search windows
//! 3. Locating each iris as the darkest point of the lower eye box
//! 4. Smoothing the iris offsets into yaw/pitch and emitting only the change
//! 5. Rotating the avatar's eye meshes by that change
//!
//! Detectors are pluggable through [`face_detection::ObjectDetector`]. With
//! the `opencv` feature, [`cascade::HaarCascade`] provides the Haar cascade
//! backend and [`source::CameraSource`] reads from a camera or video file.
//!
//! # Examples
//!
//! ## Partitioning a face
//!
//! ```
//! use mirror_gaze::eye_region::{partition, PartitionConfig};
//! use mirror_gaze::geometry::Rect;
//!
//! let windows = partition(&Rect::new(0, 0, 140, 140), &PartitionConfig::default());
//! assert_eq!(windows.right, Rect::new(20, 35, 50, 35));
//! assert_eq!(windows.left, Rect::new(70, 35, 50, 35));
//! ```
//!
//! ## Smoothing
//!
//! ```
//! use mirror_gaze::smoothing::GazeSmoother;
//!
//! let mut smoother = GazeSmoother::new(3);
//! let first = smoother.update(10.0, 0.0);
//! let second = smoother.update(20.0, 0.0);
//! assert_eq!(first.yaw + second.yaw, 15.0);
//! ```
//!
//! ## Complete Pipeline Example
//!
//! ```no_run
//! use mirror_gaze::{
//!     face_detection::{DetectionParams, FaceRegionDetector, FaceSelection},
//!     frame::Frame,
//!     gaze::{AvatarEyes, ChannelRenderer},
//!     geometry::Rect,
//!     iris::IrisLocalizer,
//!     orientation::RotationBucket,
//!     pipeline::{Detectors, GazePipeline, PipelineSettings},
//! };
//! use image::GrayImage;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Any closure can stand in for a cascade
//! let face = |_: &GrayImage, _: &DetectionParams| -> mirror_gaze::Result<Vec<Rect>> {
//!     Ok(vec![Rect::new(0, 0, 140, 140)])
//! };
//! let eye = |_: &GrayImage, _: &DetectionParams| -> mirror_gaze::Result<Vec<Rect>> {
//!     Ok(vec![Rect::new(5, 0, 40, 30)])
//! };
//! let detectors = Detectors {
//!     face: Some(FaceRegionDetector::new(Box::new(face), DetectionParams::face(), FaceSelection::Largest)),
//!     left_eye: Some(IrisLocalizer::new(Box::new(eye))),
//!     right_eye: Some(IrisLocalizer::new(Box::new(eye))),
//! };
//!
//! let (renderer, commands) = ChannelRenderer::new(16);
//! let mut pipeline = GazePipeline::new(detectors, PipelineSettings::default(), Box::new(renderer));
//! pipeline.set_rotation_bucket(RotationBucket::Deg90);
//!
//! let frame = Frame::from_dynamic(&image::open("frame.png")?)?;
//! let report = pipeline.process_frame(&frame)?;
//! println!("Face: {:?}", report.face);
//!
//! let mut eyes = AvatarEyes::new();
//! eyes.drain(&commands);
//! # Ok(())
//! # }
//! ```

/// Per-frame color and grayscale buffers
pub mod frame;

/// Integer boxes and floating points
pub mod geometry;

/// Face detection and the detector seam
pub mod face_detection;

/// Haar cascade detectors through `OpenCV`
#[cfg(feature = "opencv")]
pub mod cascade;

/// Eye search windows derived from a face box
pub mod eye_region;

/// Iris localisation by darkest-point search
pub mod iris;

/// Rotation buckets, downscaling and coordinate remapping
pub mod orientation;

/// Moving-average smoothing of gaze angles
pub mod smoothing;

/// Mapping gaze deltas onto avatar eye meshes
pub mod gaze;

/// Coordinate updates for the presentation thread
pub mod ui;

/// Frame sources and the listener contract
pub mod source;

/// Per-frame tracking pipeline
pub mod pipeline;

/// Utility functions for pixel search and numeric casts
pub mod utils;

/// Error types and result handling
pub mod error;

/// Main application module
#[cfg(feature = "opencv")]
pub mod app;

/// Constants used throughout the application
pub mod constants;

/// Configuration management
pub mod config;

pub use error::{Error, Result};
