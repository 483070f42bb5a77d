//! Integer boxes and floating points shared by every pipeline stage.
//!
//! Neither type records which coordinate space it lives in. Callers keep
//! track of that: search space (downscaled, upright) or frame space
//! (full-resolution sensor buffer).

use serde::{Deserialize, Serialize};

/// Axis-aligned integer box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge
    pub x: i32,
    /// Top edge
    pub y: i32,
    /// Width in pixels
    pub width: i32,
    /// Height in pixels
    pub height: i32,
}

impl Rect {
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Exclusive right edge
    #[must_use]
    pub const fn right(&self) -> i32 {
        self.x + self.width
    }

    /// Exclusive bottom edge
    #[must_use]
    pub const fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Area in pixels, zero for degenerate boxes
    #[must_use]
    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            i64::from(self.width) * i64::from(self.height)
        }
    }

    /// True when the box covers no pixel
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Geometric center
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(
            f64::from(self.x) + f64::from(self.width) / 2.0,
            f64::from(self.y) + f64::from(self.height) / 2.0,
        )
    }

    /// Shift the box by an offset
    #[must_use]
    pub const fn translate(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// True when the two boxes share at least one pixel
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        !self.intersection(other).is_empty()
    }

    /// Overlapping part of two boxes (empty when disjoint)
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        Self::new(x, y, (right - x).max(0), (bottom - y).max(0))
    }

    /// True when `other` lies entirely inside this box
    #[must_use]
    pub const fn contains_rect(&self, other: &Self) -> bool {
        other.x >= self.x && other.y >= self.y && other.right() <= self.right() && other.bottom() <= self.bottom()
    }

    /// Clip to an image of the given size
    #[must_use]
    pub fn clip_to(&self, width: u32, height: u32) -> Self {
        let bounds = Self::new(
            0,
            0,
            i32::try_from(width).unwrap_or(i32::MAX),
            i32::try_from(height).unwrap_or(i32::MAX),
        );
        self.intersection(&bounds)
    }
}

/// Floating point coordinate
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Displacement from `origin` to this point
    #[must_use]
    pub fn offset_from(&self, origin: &Self) -> (f64, f64) {
        (self.x - origin.x, self.y - origin.y)
    }

    /// True when both coordinates agree within `epsilon`
    #[must_use]
    pub fn approx_eq(&self, other: &Self, epsilon: f64) -> bool {
        (self.x - other.x).abs() <= epsilon && (self.y - other.y).abs() <= epsilon
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touching_rects_do_not_intersect() {
        let left = Rect::new(0, 0, 10, 10);
        let right = Rect::new(10, 0, 10, 10);
        assert!(!left.intersects(&right));
        assert!(left.intersects(&Rect::new(9, 9, 5, 5)));
    }

    #[test]
    fn test_clip_to_bounds() {
        let clipped = Rect::new(-5, 90, 20, 20).clip_to(100, 100);
        assert_eq!(clipped, Rect::new(0, 90, 15, 10));

        let outside = Rect::new(200, 200, 10, 10).clip_to(100, 100);
        assert!(outside.is_empty());
        assert_eq!(outside.area(), 0);
    }

    #[test]
    fn test_center_and_offset() {
        let rect = Rect::new(20, 49, 50, 21);
        let center = rect.center();
        assert_eq!(center, Point::new(45.0, 59.5));

        let (dx, dy) = Point::new(47.0, 58.5).offset_from(&center);
        assert_eq!((dx, dy), (2.0, -1.0));
    }

    #[test]
    fn test_contains_rect() {
        let face = Rect::new(0, 0, 140, 140);
        assert!(face.contains_rect(&Rect::new(20, 35, 50, 35)));
        assert!(!face.contains_rect(&Rect::new(100, 35, 50, 35)));
    }
}
