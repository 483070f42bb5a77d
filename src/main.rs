//! Webcam gaze tracker driving the eyes of a 3-D avatar.

use anyhow::Result;
use clap::Parser;
use log::info;
use mirror_gaze::{
    app::{AppConfig, GazeApp, InputSource},
    config::Config,
    orientation::RotationBucket,
    source::VideoSource,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Camera index to use
    #[arg(long, default_value = "0")]
    cam: i32,

    /// Video file to process
    #[arg(short, long, conflicts_with = "frames")]
    video: Option<String>,

    /// Directory of still images to replay as frames
    #[arg(long)]
    frames: Option<PathBuf>,

    /// Device rotation in degrees (0, 90, 180, 270)
    #[arg(short, long, default_value = "0")]
    rotation: u16,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<String>,

    /// Print an example configuration file and exit
    #[arg(long)]
    print_config: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logger
    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    if args.print_config {
        print!("{}", mirror_gaze::config::EXAMPLE_CONFIG);
        return Ok(());
    }

    info!("Mirror gaze tracker");

    // Load configuration if provided
    let tracker = if let Some(config_path) = &args.config {
        info!("Loading configuration from: {}", config_path);
        match Config::from_file(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                log::warn!("Failed to load config file: {}. Using defaults.", e);
                Config::default()
            }
        }
    } else {
        Config::default()
    };

    let input = if let Some(dir) = args.frames {
        InputSource::Frames(dir)
    } else if let Some(video_path) = args.video {
        InputSource::Video(VideoSource::File(video_path))
    } else {
        InputSource::Video(VideoSource::Camera(args.cam))
    };

    let config = AppConfig {
        input,
        rotation: RotationBucket::from_degrees(args.rotation)?,
        tracker,
    };

    // Create and run application
    let mut app = GazeApp::new(config)?;
    app.run()?;

    Ok(())
}
