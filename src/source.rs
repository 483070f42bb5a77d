//! Frame sources and the listener contract they push frames through.
//!
//! A source owns the capture loop and calls its listener synchronously:
//! `on_frame` must return before the next frame is delivered, so a slow
//! listener throttles the source instead of building a queue.

use crate::frame::Frame;
use crate::{Error, Result};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Receiver of a frame stream
pub trait FrameListener {
    /// Called once before the first frame with the sensor frame size
    fn on_stream_started(&mut self, width: u32, height: u32);

    /// Called for every captured frame, never re-entrantly
    fn on_frame(&mut self, frame: &Frame);

    /// Called once after the last frame
    fn on_stream_stopped(&mut self);
}

/// Shared flag asking a running source to stop after the current frame
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "pgm"];

/// Replays a directory of still images as a frame stream
///
/// Files are delivered in lexical order. Images that fail to decode or do
/// not match the size of the first frame are skipped with a warning.
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
}

impl ImageSequenceSource {
    /// Collect the image files of `dir`
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read or holds no images
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if path.is_file() && is_image {
                paths.push(path);
            }
        }
        paths.sort();

        if paths.is_empty() {
            return Err(Error::InvalidInput(format!("No images found in {}", dir.display())));
        }
        info!("Found {} frame(s) in {}", paths.len(), dir.display());
        Ok(Self { paths })
    }

    /// Replay an explicit list of files
    #[must_use]
    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Push every image through `listener`; returns the number delivered
    ///
    /// # Errors
    ///
    /// Returns an error if the first image cannot be decoded, since the
    /// stream size is taken from it
    pub fn run(&self, listener: &mut dyn FrameListener, stop: &StopHandle) -> Result<usize> {
        let Some(first) = self.paths.first() else {
            return Ok(0);
        };
        let first = Frame::from_dynamic(&image::open(first)?)?;
        let (width, height) = (first.width(), first.height());

        listener.on_stream_started(width, height);
        listener.on_frame(&first);
        let mut delivered = 1;

        for path in &self.paths[1..] {
            if stop.is_stopped() {
                debug!("Image sequence stopped after {delivered} frame(s)");
                break;
            }
            let frame = match image::open(path).map_err(Error::from).and_then(|img| Frame::from_dynamic(&img)) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("Skipping {}: {e}", path.display());
                    continue;
                }
            };
            if (frame.width(), frame.height()) != (width, height) {
                warn!(
                    "Skipping {}: size {}x{} differs from stream size {width}x{height}",
                    path.display(),
                    frame.width(),
                    frame.height()
                );
                continue;
            }
            listener.on_frame(&frame);
            delivered += 1;
        }

        listener.on_stream_stopped();
        Ok(delivered)
    }
}

#[cfg(feature = "opencv")]
pub use camera::{CameraSource, VideoSource};

#[cfg(feature = "opencv")]
mod camera {
    use super::{FrameListener, StopHandle};
    use crate::frame::Frame;
    use crate::{Error, Result};
    use image::RgbaImage;
    use log::{info, warn};
    use opencv::{
        core::Mat,
        imgproc,
        prelude::*,
        videoio::{self, VideoCapture, CAP_PROP_BUFFERSIZE},
    };

    /// Where the capture device reads from
    #[derive(Debug, Clone)]
    pub enum VideoSource {
        /// Webcam index
        Camera(i32),
        /// Video file path
        File(String),
    }

    /// Frame source backed by an `OpenCV` capture device or video file
    pub struct CameraSource {
        source: VideoSource,
        capture: VideoCapture,
    }

    impl CameraSource {
        /// Open the capture device
        ///
        /// # Errors
        ///
        /// Returns an error if the device or file cannot be opened
        pub fn open(source: VideoSource) -> Result<Self> {
            let capture = match &source {
                VideoSource::Camera(index) => {
                    info!("Opening camera {index}");
                    let mut cap = VideoCapture::new(*index, videoio::CAP_ANY)?;
                    // Keep latency low on live devices
                    cap.set(CAP_PROP_BUFFERSIZE, 1.0)?;
                    cap
                }
                VideoSource::File(path) => {
                    info!("Opening video file: {path}");
                    VideoCapture::from_file(path, videoio::CAP_ANY)?
                }
            };
            if !capture.is_opened()? {
                return Err(Error::InvalidInput(format!("Cannot open video source {source:?}")));
            }
            Ok(Self { source, capture })
        }

        /// Read frames until the source ends or `stop` is raised
        ///
        /// # Errors
        ///
        /// Returns an error if the capture device fails
        pub fn run(&mut self, listener: &mut dyn FrameListener, stop: &StopHandle) -> Result<usize> {
            let mut mat = Mat::default();
            let mut delivered = 0;
            let mut started = false;

            while !stop.is_stopped() {
                if !self.capture.read(&mut mat)? || mat.empty() {
                    if matches!(self.source, VideoSource::File(_)) {
                        info!("End of video file reached");
                        break;
                    }
                    warn!("Failed to read frame, retrying...");
                    continue;
                }

                let frame = match mat_to_frame(&mat) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!("Dropping undecodable frame: {e}");
                        continue;
                    }
                };
                if !started {
                    listener.on_stream_started(frame.width(), frame.height());
                    started = true;
                }
                listener.on_frame(&frame);
                delivered += 1;
            }

            if started {
                listener.on_stream_stopped();
            }
            Ok(delivered)
        }
    }

    /// Convert a BGR capture buffer into a [`Frame`]
    fn mat_to_frame(mat: &Mat) -> Result<Frame> {
        let mut rgba = Mat::default();
        imgproc::cvt_color(mat, &mut rgba, imgproc::COLOR_BGR2RGBA, 0)?;
        let width = u32::try_from(rgba.cols()).map_err(|_| Error::InvalidInput("Negative frame width".to_string()))?;
        let height = u32::try_from(rgba.rows()).map_err(|_| Error::InvalidInput("Negative frame height".to_string()))?;
        let bytes = rgba.data_bytes()?.to_vec();
        let color = RgbaImage::from_raw(width, height, bytes)
            .ok_or_else(|| Error::InvalidInput("Frame buffer size mismatch".to_string()))?;
        Frame::from_color(color)
    }
}
