//! Temporal smoothing of raw gaze angles.
//!
//! Each eye keeps one short moving-average window per axis. The average is
//! read before and after every push; the renderer only ever receives the
//! difference, so rotation already applied to the mesh is never re-applied.

use crate::constants::DEFAULT_SMOOTHING_WINDOW;
use crate::iris::EyeSample;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Fixed-capacity FIFO of samples with an arithmetic mean
#[derive(Debug, Clone)]
pub struct SmoothingWindow {
    capacity: usize,
    samples: VecDeque<f64>,
}

impl SmoothingWindow {
    /// Create an empty window; a zero capacity is raised to one
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a sample, evicting the oldest once full
    pub fn push(&mut self, sample: f64) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Mean of the current contents, zero when empty
    #[must_use]
    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.samples.iter().sum::<f64>() / self.samples.len() as f64
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Gains turning pixel offsets into angles
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazeGains {
    /// Applied to the horizontal iris offset
    pub yaw: f64,
    /// Applied to the vertical iris offset
    pub pitch: f64,
}

impl GazeGains {
    /// Raw `(yaw, pitch)` sample for one observation
    #[must_use]
    pub fn raw_angles(&self, sample: &EyeSample) -> (f64, f64) {
        let (dx, dy) = sample.iris.offset_from(&sample.eye_center);
        (self.yaw * dx, self.pitch * dy)
    }
}

/// Change of the smoothed angles caused by one sample
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GazeDelta {
    pub yaw: f64,
    pub pitch: f64,
}

impl GazeDelta {
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.yaw == 0.0 && self.pitch == 0.0
    }
}

/// Moving average over yaw and pitch for one eye
#[derive(Debug, Clone)]
pub struct GazeSmoother {
    yaw: SmoothingWindow,
    pitch: SmoothingWindow,
}

impl Default for GazeSmoother {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING_WINDOW)
    }
}

impl GazeSmoother {
    #[must_use]
    pub fn new(window_size: usize) -> Self {
        Self {
            yaw: SmoothingWindow::new(window_size),
            pitch: SmoothingWindow::new(window_size),
        }
    }

    /// Push one raw sample and return how far the averages moved
    pub fn update(&mut self, yaw: f64, pitch: f64) -> GazeDelta {
        let (yaw_before, pitch_before) = self.averages();
        self.yaw.push(yaw);
        self.pitch.push(pitch);
        let (yaw_after, pitch_after) = self.averages();

        GazeDelta {
            yaw: yaw_after - yaw_before,
            pitch: pitch_after - pitch_before,
        }
    }

    /// Current smoothed `(yaw, pitch)`
    #[must_use]
    pub fn averages(&self) -> (f64, f64) {
        (self.yaw.average(), self.pitch.average())
    }

    pub fn reset(&mut self) {
        self.yaw.clear();
        self.pitch.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::iris::Eye;
    use proptest::prelude::*;

    #[test]
    fn test_window_running_averages() {
        let mut window = SmoothingWindow::new(3);
        assert_eq!(window.average(), 0.0);

        let mut averages = Vec::new();
        for sample in [10.0, 20.0, 30.0] {
            window.push(sample);
            averages.push(window.average());
        }
        assert_eq!(averages, vec![10.0, 15.0, 20.0]);

        // Window is full, oldest value should be dropped
        window.push(40.0);
        assert_eq!(window.average(), 30.0);
        assert_eq!(window.len(), 3);
    }

    #[test]
    fn test_zero_offset_gives_zero_angles() {
        let gains = GazeGains { yaw: 5.0, pitch: 1.0 };
        let center = Point::new(45.0, 56.0);
        let sample = EyeSample {
            eye: Eye::Left,
            eye_center: center,
            iris: center,
        };
        assert_eq!(gains.raw_angles(&sample), (0.0, 0.0));
    }

    #[test]
    fn test_yaw_gain_exceeds_pitch_gain() {
        let gains = GazeGains { yaw: 5.0, pitch: 1.0 };
        let sample = EyeSample {
            eye: Eye::Right,
            eye_center: Point::new(10.0, 10.0),
            iris: Point::new(12.0, 7.0),
        };
        assert_eq!(gains.raw_angles(&sample), (10.0, -3.0));
    }

    #[test]
    fn test_update_returns_incremental_delta() {
        let mut smoother = GazeSmoother::new(3);
        let first = smoother.update(10.0, 4.0);
        assert_eq!(first, GazeDelta { yaw: 10.0, pitch: 4.0 });

        let second = smoother.update(20.0, 4.0);
        assert_eq!(second, GazeDelta { yaw: 5.0, pitch: 0.0 });
        assert_eq!(smoother.averages(), (15.0, 4.0));
    }

    #[test]
    fn test_reset_clears_history() {
        let mut smoother = GazeSmoother::default();
        smoother.update(3.0, 3.0);
        smoother.reset();
        assert_eq!(smoother.averages(), (0.0, 0.0));
    }

    proptest! {
        #[test]
        fn prop_window_never_exceeds_capacity(
            capacity in 1usize..8,
            samples in proptest::collection::vec(-100.0f64..100.0, 0..40),
        ) {
            let mut window = SmoothingWindow::new(capacity);
            for sample in samples {
                window.push(sample);
                prop_assert!(window.len() <= capacity);
            }
        }

        #[test]
        fn prop_deltas_sum_to_average_change(
            initial in proptest::collection::vec(-50.0f64..50.0, 0..5),
            steady in -50.0f64..50.0,
            frames in 3usize..20,
        ) {
            let mut smoother = GazeSmoother::new(3);
            for value in &initial {
                smoother.update(*value, *value);
            }
            let (start, _) = smoother.averages();

            let mut total = 0.0;
            for _ in 0..frames {
                total += smoother.update(steady, steady).yaw;
            }
            prop_assert!((total - (steady - start)).abs() < 1e-9);
        }
    }
}
