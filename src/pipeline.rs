//! Per-frame gaze tracking pipeline.
//!
//! Each frame runs synchronously on the caller's thread:
//!
//! 1. read the rotation bucket and build the [`OrientationAdapter`]
//! 2. downscale and turn the grayscale buffer upright
//! 3. detect a face and split it into two eye windows
//! 4. localise the iris in each window
//! 5. smooth the raw angles and forward the deltas to the renderer
//!
//! Missing detections skip the rest of the work for that eye or frame.
//! A detector that could not be loaded is passed as `None` and disables its
//! stage for the whole session.

use crate::config::Config;
use crate::eye_region::{partition, PartitionConfig};
use crate::face_detection::FaceRegionDetector;
use crate::frame::Frame;
use crate::gaze::{GazeCommand, GazeDrive, GazeMapper, GazeRenderer};
use crate::geometry::{Point, Rect};
use crate::iris::{Eye, EyeSample, IrisLocalizer};
use crate::orientation::{OrientationAdapter, RotationBucket, RotationHandle};
use crate::smoothing::{GazeDelta, GazeGains, GazeSmoother};
use crate::source::FrameListener;
use crate::ui::{ui_channel, UiPublisher, UiSubscriber, UiUpdate};
use crate::Result;
use log::{debug, info, warn};

/// Detectors used by the pipeline; `None` disables the stage
#[derive(Default)]
pub struct Detectors {
    pub face: Option<FaceRegionDetector>,
    pub left_eye: Option<IrisLocalizer>,
    pub right_eye: Option<IrisLocalizer>,
}

impl Detectors {
    fn localizer(&mut self, eye: Eye) -> Option<&mut IrisLocalizer> {
        match eye {
            Eye::Left => self.left_eye.as_mut(),
            Eye::Right => self.right_eye.as_mut(),
        }
    }
}

/// Numeric settings of the pipeline
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub target_size: u32,
    pub partition: PartitionConfig,
    pub gains: GazeGains,
    pub window_size: usize,
    pub drive: GazeDrive,
}

impl PipelineSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            target_size: config.detection.target_size,
            partition: config.partition.clone(),
            gains: config.gaze.gains(),
            window_size: config.gaze.window_size,
            drive: config.gaze.drive.into(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// One eye's result, with overlay geometry mapped back to the sensor frame
#[derive(Debug, Clone, PartialEq)]
pub struct EyeReport {
    /// Sample in upright search space, as used for the gaze angles
    pub sample: EyeSample,
    /// Eye cascade box in frame space
    pub eye_box: Rect,
    /// Eye center in frame space
    pub eye_center: Point,
    /// Iris in frame space
    pub iris: Point,
    /// Change of the smoothed angles caused by this sample
    pub delta: GazeDelta,
    /// Commands handed to the renderer
    pub commands: Vec<GazeCommand>,
}

/// Outcome of one frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub rotation: RotationBucket,
    pub ratio: f64,
    /// Selected face in frame space
    pub face: Option<Rect>,
    pub eyes: Vec<EyeReport>,
}

impl FrameReport {
    fn empty(adapter: &OrientationAdapter) -> Self {
        Self {
            rotation: adapter.bucket(),
            ratio: adapter.ratio(),
            face: None,
            eyes: Vec::new(),
        }
    }

    #[must_use]
    pub fn eye(&self, eye: Eye) -> Option<&EyeReport> {
        self.eyes.iter().find(|report| report.sample.eye == eye)
    }
}

#[derive(Debug, Clone, Copy)]
struct StreamState {
    width: u32,
    height: u32,
}

/// Face → eyes → iris → smoothing → renderer
pub struct GazePipeline {
    detectors: Detectors,
    settings: PipelineSettings,
    rotation: RotationHandle,
    smoothers: [GazeSmoother; 2],
    mapper: GazeMapper,
    ui: Option<UiPublisher>,
    stream: Option<StreamState>,
    last_report: Option<FrameReport>,
    frames_processed: u64,
}

impl GazePipeline {
    /// Create a pipeline that starts in the 0° bucket with no UI stream
    #[must_use]
    pub fn new(detectors: Detectors, settings: PipelineSettings, renderer: Box<dyn GazeRenderer>) -> Self {
        if detectors.face.is_none() {
            warn!("Face detector unavailable, gaze tracking disabled");
        }
        for (eye, present) in [(Eye::Left, detectors.left_eye.is_some()), (Eye::Right, detectors.right_eye.is_some())] {
            if !present {
                warn!("{eye} eye detector unavailable, {eye} eye disabled");
            }
        }

        let window_size = settings.window_size;
        let mapper = GazeMapper::new(settings.drive, renderer);
        Self {
            detectors,
            settings,
            rotation: RotationHandle::default(),
            smoothers: [GazeSmoother::new(window_size), GazeSmoother::new(window_size)],
            mapper,
            ui: None,
            stream: None,
            last_report: None,
            frames_processed: 0,
        }
    }

    /// Build a pipeline from configuration; also returns the UI end if enabled
    #[must_use]
    pub fn from_config(
        config: &Config,
        detectors: Detectors,
        renderer: Box<dyn GazeRenderer>,
    ) -> (Self, Option<UiSubscriber>) {
        let pipeline = Self::new(detectors, PipelineSettings::from_config(config), renderer);
        if config.ui.enabled {
            let (publisher, subscriber) = ui_channel(config.ui.channel_capacity);
            (pipeline.with_ui(publisher), Some(subscriber))
        } else {
            (pipeline, None)
        }
    }

    /// Share an externally owned rotation holder
    #[must_use]
    pub fn with_rotation(mut self, rotation: RotationHandle) -> Self {
        self.rotation = rotation;
        self
    }

    /// Publish per-eye coordinates to a UI thread
    #[must_use]
    pub fn with_ui(mut self, publisher: UiPublisher) -> Self {
        self.ui = Some(publisher);
        self
    }

    /// Handle for the orientation service; writes are visible from the next frame
    #[must_use]
    pub fn rotation(&self) -> RotationHandle {
        self.rotation.clone()
    }

    pub fn set_rotation_bucket(&self, bucket: RotationBucket) {
        self.rotation.set(bucket);
    }

    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.stream.is_some()
    }

    #[must_use]
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    #[must_use]
    pub fn last_report(&self) -> Option<&FrameReport> {
        self.last_report.as_ref()
    }

    #[must_use]
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Smoothed `(yaw, pitch)` of one eye
    #[must_use]
    pub fn smoothed_angles(&self, eye: Eye) -> (f64, f64) {
        self.smoothers[eye.index()].averages()
    }

    /// Run the full pipeline on one frame
    ///
    /// # Errors
    ///
    /// Returns an error if a detector fails or the frame size does not fit
    /// the coordinate types
    pub fn process_frame(&mut self, frame: &Frame) -> Result<FrameReport> {
        let adapter = OrientationAdapter::new(
            self.rotation.get(),
            self.settings.target_size,
            frame.width(),
            frame.height(),
        );
        let mut report = FrameReport::empty(&adapter);
        self.mapper.flush();

        let Some(face_detector) = self.detectors.face.as_mut() else {
            return Ok(report);
        };
        let search = adapter.search_image(frame.gray());
        let Some(face) = face_detector.detect_one(&search)? else {
            debug!("No face this frame");
            return Ok(report);
        };
        report.face = Some(adapter.to_frame_rect(face)?);

        let windows = partition(&face, &self.settings.partition);
        // Both eyes are located before any state changes, so an error leaves
        // the smoothers and meshes untouched
        let mut located = Vec::with_capacity(Eye::BOTH.len());
        for (eye, window) in [(Eye::Left, windows.left), (Eye::Right, windows.right)] {
            let Some(localizer) = self.detectors.localizer(eye) else {
                continue;
            };
            let Some(observation) = localizer.locate(&search, &window)? else {
                debug!("No {eye} eye this frame");
                continue;
            };
            let eye_box = adapter.to_frame_rect(observation.eye_box)?;
            located.push((eye, observation, eye_box));
        }

        for (eye, observation, eye_box) in located {
            let sample = EyeSample::new(eye, &observation);
            let (yaw, pitch) = self.settings.gains.raw_angles(&sample);
            let delta = self.smoothers[eye.index()].update(yaw, pitch);
            let commands = self.mapper.apply(eye, delta);

            if let Some(ui) = self.ui.as_mut() {
                if !ui.publish(UiUpdate::from(&sample)) {
                    info!("UI stream closed");
                    self.ui = None;
                }
            }

            report.eyes.push(EyeReport {
                sample,
                eye_box,
                eye_center: adapter.to_frame_point(observation.eye_center),
                iris: adapter.to_frame_point(observation.iris),
                delta,
                commands,
            });
        }

        Ok(report)
    }
}

impl FrameListener for GazePipeline {
    fn on_stream_started(&mut self, width: u32, height: u32) {
        info!("Stream started at {width}x{height}");
        self.stream = Some(StreamState { width, height });
        self.last_report = None;
        for smoother in &mut self.smoothers {
            smoother.reset();
        }
    }

    fn on_frame(&mut self, frame: &Frame) {
        let Some(stream) = self.stream else {
            debug!("Frame delivered outside a stream, ignoring");
            return;
        };
        if (frame.width(), frame.height()) != (stream.width, stream.height) {
            warn!(
                "Frame size {}x{} differs from stream size {}x{}, skipping",
                frame.width(),
                frame.height(),
                stream.width,
                stream.height
            );
            return;
        }

        match self.process_frame(frame) {
            Ok(report) => self.last_report = Some(report),
            Err(e) => {
                warn!("Frame processing failed: {e}");
                self.last_report = None;
            }
        }
        self.frames_processed += 1;
    }

    fn on_stream_stopped(&mut self) {
        info!("Stream stopped after {} frame(s)", self.frames_processed);
        self.mapper.flush();
        self.stream = None;
        self.last_report = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face_detection::{DetectionParams, FaceSelection};
    use crate::gaze::{AvatarEyes, ChannelRenderer};
    use crate::{Error, Result};
    use image::{GrayImage, Luma};

    fn fixed(rects: Vec<Rect>) -> Box<dyn crate::face_detection::ObjectDetector> {
        Box::new(move |_: &GrayImage, _: &DetectionParams| -> Result<Vec<Rect>> { Ok(rects.clone()) })
    }

    fn detectors() -> Detectors {
        Detectors {
            face: Some(FaceRegionDetector::new(
                fixed(vec![Rect::new(0, 0, 140, 140)]),
                DetectionParams::face(),
                FaceSelection::Largest,
            )),
            left_eye: Some(IrisLocalizer::new(fixed(vec![Rect::new(5, 0, 40, 30)]))),
            right_eye: Some(IrisLocalizer::new(fixed(vec![Rect::new(5, 0, 40, 30)]))),
        }
    }

    // Subject's left eye first; its zone is centered at (95, 56)
    fn frame_with_irises(left: (u32, u32), right: (u32, u32)) -> Frame {
        let mut gray = GrayImage::from_pixel(200, 200, Luma([200]));
        gray.put_pixel(left.0, left.1, Luma([0]));
        gray.put_pixel(right.0, right.1, Luma([0]));
        Frame::from_gray(gray).unwrap()
    }

    #[test]
    fn test_centered_iris_gives_zero_delta() {
        let (renderer, commands) = ChannelRenderer::new(16);
        let mut pipeline = GazePipeline::new(detectors(), PipelineSettings::default(), Box::new(renderer));
        pipeline.set_rotation_bucket(RotationBucket::Deg90);

        let report = pipeline.process_frame(&frame_with_irises((95, 56), (45, 56))).unwrap();
        assert_eq!(report.ratio, 1.0);
        assert_eq!(report.face, Some(Rect::new(0, 0, 140, 140)));

        let left = report.eye(Eye::Left).unwrap();
        assert_eq!(left.sample.eye_center, Point::new(95.0, 56.0));
        assert_eq!(left.sample.iris, Point::new(95.0, 56.0));
        assert!(left.delta.is_zero());
        assert!(report.eye(Eye::Right).unwrap().delta.is_zero());

        let mut eyes = AvatarEyes::new();
        assert_eq!(eyes.drain(&commands), 2);
        for eye in Eye::BOTH {
            assert!(eyes.orientation(eye).angle() < 1e-12);
        }
    }

    #[test]
    fn test_offset_iris_is_smoothed_incrementally() {
        let (renderer, _commands) = ChannelRenderer::new(16);
        let mut pipeline = GazePipeline::new(detectors(), PipelineSettings::default(), Box::new(renderer));
        pipeline.set_rotation_bucket(RotationBucket::Deg90);

        let frame = frame_with_irises((97, 56), (45, 56));
        let first = pipeline.process_frame(&frame).unwrap();
        let second = pipeline.process_frame(&frame).unwrap();

        // Raw yaw is 5 * 2 = 10
        assert_eq!(first.eye(Eye::Left).unwrap().delta, GazeDelta { yaw: 10.0, pitch: 0.0 });
        assert!(second.eye(Eye::Left).unwrap().delta.is_zero());
        assert_eq!(pipeline.smoothed_angles(Eye::Left), (10.0, 0.0));
        // Leading left eye drives both meshes
        assert_eq!(first.eye(Eye::Left).unwrap().commands.len(), 2);
        assert!(first.eye(Eye::Right).unwrap().commands.is_empty());
    }

    #[test]
    fn test_each_eye_cascade_searches_its_own_window() {
        use std::sync::{Arc, Mutex};

        let seen: Arc<Mutex<Vec<(Eye, u8)>>> = Arc::default();
        let recording = |eye: Eye| -> Box<dyn crate::face_detection::ObjectDetector> {
            let seen = Arc::clone(&seen);
            Box::new(move |crop: &GrayImage, _: &DetectionParams| -> Result<Vec<Rect>> {
                seen.lock().unwrap().push((eye, crop.get_pixel(0, 0)[0]));
                Ok(Vec::new())
            })
        };
        let detectors = Detectors {
            left_eye: Some(IrisLocalizer::new(recording(Eye::Left))),
            right_eye: Some(IrisLocalizer::new(recording(Eye::Right))),
            ..detectors()
        };
        let (renderer, _commands) = ChannelRenderer::new(4);
        let mut pipeline = GazePipeline::new(detectors, PipelineSettings::default(), Box::new(renderer));
        pipeline.set_rotation_bucket(RotationBucket::Deg90);

        // Image-left half is darker than the image-right half
        let gray = GrayImage::from_fn(200, 200, |x, _| if x < 70 { Luma([100]) } else { Luma([150]) });
        pipeline.process_frame(&Frame::from_gray(gray).unwrap()).unwrap();

        // The subject's right eye is on the image left
        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![(Eye::Left, 150), (Eye::Right, 100)]);
    }

    #[test]
    fn test_report_is_mapped_to_frame_space() {
        let mut detectors = detectors();
        detectors.face = Some(FaceRegionDetector::new(
            fixed(vec![Rect::new(10, 20, 30, 40)]),
            DetectionParams::face(),
            FaceSelection::First,
        ));
        let (renderer, _commands) = ChannelRenderer::new(4);
        let mut pipeline = GazePipeline::new(detectors, PipelineSettings::default(), Box::new(renderer));

        let frame = Frame::from_gray(GrayImage::from_pixel(120, 80, Luma([90]))).unwrap();
        let report = pipeline.process_frame(&frame).unwrap();
        assert_eq!(report.rotation, RotationBucket::Deg0);
        assert_eq!(report.face, Some(Rect::new(20, 10, 40, 30)));
    }

    #[test]
    fn test_missing_face_detector_disables_tracking() {
        let (renderer, commands) = ChannelRenderer::new(4);
        let detectors = Detectors {
            face: None,
            ..detectors()
        };
        let mut pipeline = GazePipeline::new(detectors, PipelineSettings::default(), Box::new(renderer));

        let report = pipeline.process_frame(&frame_with_irises((95, 56), (45, 56))).unwrap();
        assert!(report.face.is_none());
        assert!(report.eyes.is_empty());
        assert!(commands.is_empty());
    }

    #[test]
    fn test_missing_eye_detector_skips_that_eye() {
        let (renderer, _commands) = ChannelRenderer::new(4);
        let detectors = Detectors {
            right_eye: None,
            ..detectors()
        };
        let mut pipeline = GazePipeline::new(detectors, PipelineSettings::default(), Box::new(renderer));
        pipeline.set_rotation_bucket(RotationBucket::Deg90);

        let report = pipeline.process_frame(&frame_with_irises((95, 56), (45, 56))).unwrap();
        assert!(report.eye(Eye::Left).is_some());
        assert!(report.eye(Eye::Right).is_none());
    }

    #[test]
    fn test_listener_degrades_on_detector_failure() {
        let failing: Box<dyn crate::face_detection::ObjectDetector> =
            Box::new(|_: &GrayImage, _: &DetectionParams| -> Result<Vec<Rect>> {
                Err(Error::DetectionError("cascade exploded".to_string()))
            });
        let detectors = Detectors {
            face: Some(FaceRegionDetector::new(failing, DetectionParams::face(), FaceSelection::Largest)),
            ..detectors()
        };
        let (renderer, _commands) = ChannelRenderer::new(4);
        let mut pipeline = GazePipeline::new(detectors, PipelineSettings::default(), Box::new(renderer));

        let frame = frame_with_irises((95, 56), (45, 56));
        assert!(pipeline.process_frame(&frame).is_err());

        pipeline.on_stream_started(200, 200);
        pipeline.on_frame(&frame);
        assert_eq!(pipeline.frames_processed(), 1);
        assert!(pipeline.last_report().is_none());
    }

    #[test]
    fn test_frames_outside_stream_are_ignored() {
        let (renderer, _commands) = ChannelRenderer::new(4);
        let mut pipeline = GazePipeline::new(detectors(), PipelineSettings::default(), Box::new(renderer));
        let frame = frame_with_irises((95, 56), (45, 56));

        pipeline.on_frame(&frame);
        assert_eq!(pipeline.frames_processed(), 0);

        pipeline.on_stream_started(200, 200);
        assert!(pipeline.is_streaming());
        pipeline.on_frame(&frame);
        assert!(pipeline.last_report().is_some());

        pipeline.on_stream_stopped();
        assert!(!pipeline.is_streaming());
        assert!(pipeline.last_report().is_none());
        pipeline.on_frame(&frame);
        assert_eq!(pipeline.frames_processed(), 1);
    }

    #[test]
    fn test_ui_receives_coordinates() {
        let (renderer, _commands) = ChannelRenderer::new(4);
        let (pipeline, subscriber) = GazePipeline::from_config(&Config::default(), detectors(), Box::new(renderer));
        let mut pipeline = pipeline;
        let subscriber = subscriber.unwrap();
        pipeline.set_rotation_bucket(RotationBucket::Deg90);

        pipeline.process_frame(&frame_with_irises((95, 56), (45, 56))).unwrap();
        let left = subscriber.latest(Eye::Left).unwrap();
        assert_eq!(left.eye_center_text(), "95, 56");
        assert_eq!(subscriber.latest(Eye::Right).unwrap().iris_text(), "45, 56");
    }
}
