//! Checked and saturating numeric conversions for pixel geometry

use crate::{Error, Result};

/// Safely convert u32 to i32 with overflow checking
///
/// # Errors
///
/// Returns an error if the value exceeds i32::MAX
pub fn u32_to_i32(value: u32) -> Result<i32> {
    value
        .try_into()
        .map_err(|_| Error::InvalidInput(format!("Value {value} too large to fit in i32")))
}

/// Truncate toward zero, saturating at the i32 range; NaN maps to 0
#[must_use]
#[allow(clippy::cast_possible_truncation)] // `as` saturates for floats
pub fn f64_to_i32_trunc(value: f64) -> i32 {
    value as i32
}

/// Convert a non-negative i32 to u32, clamping negatives to zero
#[must_use]
#[allow(clippy::cast_sign_loss)] // Negative values are clamped first
pub fn i32_to_u32_clamp(value: i32) -> u32 {
    value.max(0) as u32
}

/// Round a scaled image dimension to whole pixels, never below one
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // Clamped before the cast
pub fn scaled_dimension(size: u32, ratio: f64) -> u32 {
    let scaled = (f64::from(size) * ratio).round();
    if !scaled.is_finite() || scaled < 1.0 {
        1
    } else if scaled > f64::from(u32::MAX) {
        u32::MAX
    } else {
        scaled as u32
    }
}
