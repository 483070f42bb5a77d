//! Main application module: frame source → pipeline → avatar eyes.

use crate::{
    cascade::load_detectors,
    config::Config,
    constants::DEFAULT_RENDER_CHANNEL_CAPACITY,
    error::Result,
    gaze::{AvatarEyes, ChannelRenderer, GazeCommand},
    iris::Eye,
    orientation::{RotationBucket, RotationHandle},
    pipeline::GazePipeline,
    source::{CameraSource, ImageSequenceSource, StopHandle, VideoSource},
    ui::UiSubscriber,
};
use crossbeam_channel::{select, Receiver};
use log::{debug, info, warn};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Where frames come from
#[derive(Debug, Clone)]
pub enum InputSource {
    /// Live capture device or video file
    Video(VideoSource),
    /// Directory of still images
    Frames(PathBuf),
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Frame input
    pub input: InputSource,
    /// Initial device rotation
    pub rotation: RotationBucket,
    /// Tracker configuration
    pub tracker: Config,
}

/// Main application struct
pub struct GazeApp {
    config: AppConfig,
    rotation: RotationHandle,
    stop: StopHandle,
}

impl GazeApp {
    /// Create a new gaze tracking application
    ///
    /// # Errors
    ///
    /// Returns an error if the tracker configuration is invalid
    pub fn new(config: AppConfig) -> Result<Self> {
        info!("Initializing gaze tracking application");
        config.tracker.validate()?;
        for missing in config.tracker.missing_models() {
            warn!("Model file not found: {}", missing.display());
        }

        let rotation = RotationHandle::new(config.rotation);
        Ok(Self {
            config,
            rotation,
            stop: StopHandle::new(),
        })
    }

    /// Handle for changing the rotation bucket while running
    #[must_use]
    pub fn rotation(&self) -> RotationHandle {
        self.rotation.clone()
    }

    /// Handle for stopping the frame source
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Run until the source is exhausted or stopped
    ///
    /// # Errors
    ///
    /// Returns an error if the frame source cannot be opened or fails
    pub fn run(&mut self) -> Result<()> {
        let detectors = load_detectors(&self.config.tracker);
        let (renderer, commands) = ChannelRenderer::new(DEFAULT_RENDER_CHANNEL_CAPACITY);
        let (pipeline, subscriber) = GazePipeline::from_config(&self.config.tracker, detectors, Box::new(renderer));
        let mut pipeline = pipeline.with_rotation(self.rotation.clone());

        let render_thread = spawn_render_thread(commands)?;
        let ui_thread = subscriber.map(spawn_ui_thread).transpose()?;

        let start = Instant::now();
        let delivered = match &self.config.input {
            InputSource::Video(source) => CameraSource::open(source.clone())?.run(&mut pipeline, &self.stop)?,
            InputSource::Frames(dir) => ImageSequenceSource::from_dir(dir)?.run(&mut pipeline, &self.stop)?,
        };
        let elapsed = start.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            info!("Processed {delivered} frame(s) at {:.1} FPS", delivered as f64 / elapsed);
        }

        // Closing the pipeline disconnects the render and UI channels
        drop(pipeline);
        let eyes = render_thread
            .join()
            .map_err(|_| crate::Error::ChannelClosed("render thread panicked".to_string()))?;
        if let Some(handle) = ui_thread {
            if handle.join().is_err() {
                warn!("UI thread panicked");
            }
        }

        for eye in Eye::BOTH {
            let (yaw, pitch) = eyes.gaze_degrees(eye);
            info!("Final {eye} eye orientation: yaw {yaw:.2}°, pitch {pitch:.2}°");
        }
        info!("Application shutting down");
        Ok(())
    }
}

fn spawn_render_thread(commands: Receiver<GazeCommand>) -> Result<JoinHandle<AvatarEyes>> {
    let handle = thread::Builder::new().name("render".to_string()).spawn(move || {
        let mut eyes = AvatarEyes::new();
        for command in commands.iter() {
            eyes.apply(&command);
            let (yaw, pitch) = eyes.gaze_degrees(command.mesh);
            debug!("{} eye mesh at yaw {yaw:.2}°, pitch {pitch:.2}°", command.mesh);
        }
        eyes
    })?;
    Ok(handle)
}

fn spawn_ui_thread(subscriber: UiSubscriber) -> Result<JoinHandle<()>> {
    let handle = thread::Builder::new().name("ui".to_string()).spawn(move || {
        let left = subscriber.receiver(Eye::Left).clone();
        let right = subscriber.receiver(Eye::Right).clone();
        loop {
            select! {
                recv(left) -> update => match update {
                    Ok(update) => debug!("{update}"),
                    Err(_) => break,
                },
                recv(right) -> update => match update {
                    Ok(update) => debug!("{update}"),
                    Err(_) => break,
                },
            }
        }
    })?;
    Ok(handle)
}
