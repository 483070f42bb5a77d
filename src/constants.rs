//! Constants used throughout the application

/// Longest side of the grayscale search image, in pixels
pub const DEFAULT_TARGET_SIZE: u32 = 600;

/// Face cascade scale step between pyramid levels
pub const DEFAULT_FACE_SCALE_FACTOR: f64 = 1.1;
/// Face cascade neighbour votes required to keep a candidate
pub const DEFAULT_FACE_MIN_NEIGHBORS: i32 = 3;

/// Eye cascade scale step between pyramid levels
pub const DEFAULT_EYE_SCALE_FACTOR: f64 = 1.15;
/// Eye cascade neighbour votes required to keep a candidate
pub const DEFAULT_EYE_MIN_NEIGHBORS: i32 = 2;
/// Smallest eye the cascade may report, in search-image pixels
pub const DEFAULT_EYE_MIN_SIZE: u32 = 30;

/// Lower share of the detected eye box searched for the iris
pub const DEFAULT_IRIS_ZONE_FRACTION: f64 = 0.6;

/// Eye band starts `h / TOP_DIVISOR` below the top of the face
pub const DEFAULT_TOP_DIVISOR: f64 = 4.0;
/// Eye band is `h / HEIGHT_DIVISOR` tall
pub const DEFAULT_HEIGHT_DIVISOR: f64 = 4.0;
/// `w / MARGIN_DIVISOR` is reserved on both outer edges of the face
pub const DEFAULT_MARGIN_DIVISOR: i32 = 7;

/// Gain applied to the horizontal iris offset
pub const DEFAULT_YAW_MULTIPLIER: f64 = 5.0;
/// Gain applied to the vertical iris offset
pub const DEFAULT_PITCH_MULTIPLIER: f64 = 1.0;
/// Samples kept per eye and axis by the moving average
pub const DEFAULT_SMOOTHING_WINDOW: usize = 3;

/// Pending UI updates kept per eye before the oldest is dropped
pub const DEFAULT_UI_CHANNEL_CAPACITY: usize = 4;
/// Pending rotation commands kept for the render thread
pub const DEFAULT_RENDER_CHANNEL_CAPACITY: usize = 64;
