//! Orientation adapter tests: downscaling, upright search images and remaps

use image::{GrayImage, Luma};
use mirror_gaze::{
    geometry::{Point, Rect},
    orientation::{scale_ratio, OrientationAdapter, RotationBucket},
    utils::darkest_pixel,
};
use proptest::prelude::*;

#[test]
fn test_downscale_ratio() {
    assert_eq!(scale_ratio(480, 300, 200), 1.0);
    assert_eq!(scale_ratio(480, 960, 540), 0.5);
    assert_eq!(scale_ratio(600, 1920, 1080), 600.0 / 1920.0);
}

#[test]
fn test_dark_pixel_found_at_same_frame_location_in_every_bucket() {
    let (width, height) = (40u32, 30u32);
    let target = (7u32, 11u32);
    let mut gray = GrayImage::from_pixel(width, height, Luma([180]));
    gray.put_pixel(target.0, target.1, Luma([0]));

    for bucket in RotationBucket::ALL {
        let adapter = OrientationAdapter::new(bucket, 600, width, height);
        let search = adapter.search_image(&gray);
        let (sx, sy) = darkest_pixel(&search).unwrap();

        let center = Point::new(f64::from(sx) + 0.5, f64::from(sy) + 0.5);
        let frame = adapter.to_frame_point(center);
        assert_eq!(
            (frame.x.floor() as u32, frame.y.floor() as u32),
            target,
            "bucket {bucket}"
        );
    }
}

#[test]
fn test_scaled_search_maps_back_to_full_resolution() {
    let adapter = OrientationAdapter::new(RotationBucket::Deg270, 300, 600, 400);
    assert_eq!(adapter.ratio(), 0.5);

    // (10, 20) in a 300x200 search image is (20, 40) unscaled, then mirrored
    let point = adapter.to_frame_point(Point::new(10.0, 20.0));
    assert_eq!(point, Point::new(20.0, 400.0 - 40.0));

    let rect = adapter.to_frame_rect(Rect::new(10, 20, 30, 40)).unwrap();
    assert_eq!(rect, Rect::new(20, 400 - 120, 60, 80));
}

proptest! {
    #[test]
    fn prop_remap_is_invertible(
        x in 0i32..1000,
        y in 0i32..1000,
        width in 1i32..300,
        height in 1i32..300,
        bucket_index in 0usize..4,
    ) {
        let bucket = RotationBucket::ALL[bucket_index];
        let rect = Rect::new(x, y, width, height);
        let mapped = bucket.to_frame_rect(rect, 1280, 720);
        prop_assert_eq!(mapped.area(), rect.area());
        prop_assert_eq!(bucket.from_frame_rect(mapped, 1280, 720), rect);
    }
}
