//! End-to-end tests of the gaze pipeline through its public API


use mirror_gaze::{
    config::{Config, DriveMode},
    gaze::{AvatarEyes, ChannelRenderer, GazeCommand},
    geometry::Point,
    iris::Eye,
    orientation::{RotationBucket, RotationHandle},
    pipeline::{GazePipeline, PipelineSettings},
    source::{FrameListener, ImageSequenceSource, StopHandle},
};
use std::thread;
use tempfile::TempDir;
use test_helpers::{iris_frame, iris_image, reference_detectors, LEFT_ZONE_CENTER, RIGHT_ZONE_CENTER};

#[test]
fn test_reference_scenario_yields_zero_rotation() {
    let (renderer, commands) = ChannelRenderer::new(16);
    let mut pipeline = GazePipeline::new(reference_detectors(), PipelineSettings::default(), Box::new(renderer));
    pipeline.set_rotation_bucket(RotationBucket::Deg90);

    let report = pipeline
        .process_frame(&iris_frame(LEFT_ZONE_CENTER, RIGHT_ZONE_CENTER))
        .unwrap();

    assert_eq!(report.ratio, 1.0);
    for eye in Eye::BOTH {
        let eye_report = report.eye(eye).unwrap();
        assert_eq!(eye_report.sample.iris, eye_report.sample.eye_center);
        assert!(eye_report.delta.is_zero());
    }

    let received: Vec<GazeCommand> = commands.try_iter().collect();
    assert_eq!(received.len(), 2);
    assert!(received.iter().all(|c| c.yaw_delta == 0.0 && c.pitch_delta == 0.0));
}

#[test]
fn test_constant_offset_converges_to_steady_average() {
    let (renderer, commands) = ChannelRenderer::new(64);
    let mut pipeline = GazePipeline::new(reference_detectors(), PipelineSettings::default(), Box::new(renderer));
    pipeline.set_rotation_bucket(RotationBucket::Deg90);

    // Iris one pixel right of and two pixels above the zone center
    let frame = iris_frame((96, 54), RIGHT_ZONE_CENTER);
    for _ in 0..6 {
        pipeline.process_frame(&frame).unwrap();
    }

    let mut eyes = AvatarEyes::new();
    eyes.drain(&commands);
    let mut expected = AvatarEyes::new();
    expected.rotate(Eye::Left, 5.0, -2.0);

    // Deltas sum to the steady-state average, and compose like a single turn
    assert_eq!(pipeline.smoothed_angles(Eye::Left), (5.0, -2.0));
    let error = eyes.orientation(Eye::Left).angle_to(&expected.orientation(Eye::Left));
    assert!(error.to_degrees() < 0.5, "orientation error {error}");
}

#[test]
fn test_per_eye_drive_from_config() {
    let mut config = Config::default();
    config.gaze.drive = DriveMode::PerEye;
    config.ui.enabled = false;

    let (renderer, commands) = ChannelRenderer::new(16);
    let (mut pipeline, subscriber) = GazePipeline::from_config(&config, reference_detectors(), Box::new(renderer));
    assert!(subscriber.is_none());
    pipeline.set_rotation_bucket(RotationBucket::Deg90);

    pipeline.process_frame(&iris_frame((97, 56), (43, 56))).unwrap();
    let received: Vec<GazeCommand> = commands.try_iter().collect();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].mesh, Eye::Left);
    assert_eq!(received[0].yaw_delta, 10.0);
    assert_eq!(received[1].mesh, Eye::Right);
    assert_eq!(received[1].yaw_delta, -10.0);
}

#[test]
fn test_meshes_catch_up_after_render_queue_fills() {
    let (renderer, commands) = ChannelRenderer::new(2);
    let mut pipeline = GazePipeline::new(reference_detectors(), PipelineSettings::default(), Box::new(renderer));
    pipeline.set_rotation_bucket(RotationBucket::Deg90);
    let (x, y) = LEFT_ZONE_CENTER;

    // Raw yaw 10 then 20; the render thread only drains after both frames
    pipeline.process_frame(&iris_frame((x + 2, y), RIGHT_ZONE_CENTER)).unwrap();
    pipeline.process_frame(&iris_frame((x + 4, y), RIGHT_ZONE_CENTER)).unwrap();
    let mut eyes = AvatarEyes::new();
    assert_eq!(eyes.drain(&commands), 2);

    pipeline.on_stream_stopped();
    eyes.drain(&commands);

    let (smoothed_yaw, _) = pipeline.smoothed_angles(Eye::Left);
    assert!((smoothed_yaw - 15.0).abs() < 1e-9);
    for mesh in Eye::BOTH {
        let (yaw, _) = eyes.gaze_degrees(mesh);
        assert!((yaw - smoothed_yaw).abs() < 1e-9, "{mesh} mesh yaw {yaw}");
    }
}

#[test]
fn test_image_sequence_drives_pipeline() {
    let dir = TempDir::new().unwrap();
    for i in 0..4 {
        iris_image(200, 200, LEFT_ZONE_CENTER, RIGHT_ZONE_CENTER)
            .save(dir.path().join(format!("frame_{i:02}.png")))
            .unwrap();
    }

    let (renderer, commands) = ChannelRenderer::new(64);
    let rotation = RotationHandle::new(RotationBucket::Deg90);
    let mut pipeline = GazePipeline::new(reference_detectors(), PipelineSettings::default(), Box::new(renderer))
        .with_rotation(rotation);

    let source = ImageSequenceSource::from_dir(dir.path()).unwrap();
    let delivered = source.run(&mut pipeline, &StopHandle::new()).unwrap();

    assert_eq!(delivered, 4);
    assert_eq!(pipeline.frames_processed(), 4);
    assert!(!pipeline.is_streaming());
    // Two meshes per frame from the leading left eye
    assert_eq!(commands.len(), 8);
}

#[test]
fn test_rotation_changes_from_another_thread() {
    let (renderer, _commands) = ChannelRenderer::new(256);
    let rotation = RotationHandle::default();
    let mut pipeline = GazePipeline::new(reference_detectors(), PipelineSettings::default(), Box::new(renderer))
        .with_rotation(rotation.clone());

    let writer = thread::spawn(move || {
        for i in 0..200 {
            rotation.set(RotationBucket::ALL[i % 4]);
        }
        rotation.set(RotationBucket::Deg180);
    });

    let frame = iris_frame(LEFT_ZONE_CENTER, RIGHT_ZONE_CENTER);
    pipeline.on_stream_started(200, 200);
    for _ in 0..50 {
        pipeline.on_frame(&frame);
        let report = pipeline.last_report().unwrap();
        assert!(RotationBucket::ALL.contains(&report.rotation));
    }
    writer.join().unwrap();

    pipeline.on_frame(&frame);
    assert_eq!(pipeline.last_report().unwrap().rotation, RotationBucket::Deg180);
    pipeline.on_stream_stopped();
}

#[test]
fn test_frame_space_overlay_at_180_degrees() {
    let (renderer, _commands) = ChannelRenderer::new(16);
    let mut pipeline = GazePipeline::new(reference_detectors(), PipelineSettings::default(), Box::new(renderer));
    pipeline.set_rotation_bucket(RotationBucket::Deg180);

    let report = pipeline
        .process_frame(&iris_frame(LEFT_ZONE_CENTER, RIGHT_ZONE_CENTER))
        .unwrap();

    // Search-space face (0, 0, 140, 140) maps to (W - 140, 0, 140, 140)
    let face = report.face.unwrap();
    assert_eq!((face.x, face.y, face.width, face.height), (60, 0, 140, 140));

    let left = report.eye(Eye::Left).unwrap();
    let center = left.sample.eye_center;
    assert_eq!(left.eye_center, Point::new(200.0 - center.y, center.x));
}
