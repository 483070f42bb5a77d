//! Informational coordinate updates for the presentation thread.
//!
//! Each eye has its own bounded queue so ordering holds within an eye and
//! the two streams never crowd each other out. When a queue is full the
//! oldest pending update is discarded: only the latest gaze matters for
//! display, and the capture thread never waits on the UI.

use crate::geometry::Point;
use crate::iris::{Eye, EyeSample};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::debug;
use std::fmt;
use std::sync::{Arc, Weak};

/// Eye center and iris coordinates of one eye
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UiUpdate {
    pub eye: Eye,
    pub eye_center: Point,
    pub iris: Point,
}

impl From<&EyeSample> for UiUpdate {
    fn from(sample: &EyeSample) -> Self {
        Self {
            eye: sample.eye,
            eye_center: sample.eye_center,
            iris: sample.iris,
        }
    }
}

impl UiUpdate {
    /// Eye center as display text
    #[must_use]
    pub fn eye_center_text(&self) -> String {
        format!("{}, {}", self.eye_center.x, self.eye_center.y)
    }

    /// Iris as display text
    #[must_use]
    pub fn iris_text(&self) -> String {
        format!("{}, {}", self.iris.x, self.iris.y)
    }
}

impl fmt::Display for UiUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} eye: center {}, iris {}",
            self.eye,
            self.eye_center_text(),
            self.iris_text()
        )
    }
}

struct EyeQueue {
    sender: Sender<UiUpdate>,
    // Kept so the publisher can evict the oldest entry itself
    evictor: Receiver<UiUpdate>,
}

/// Capture-side end of the UI queues
pub struct UiPublisher {
    queues: [EyeQueue; 2],
    consumer: Weak<()>,
    closed: bool,
}

/// Presentation-side end of the UI queues
#[derive(Clone)]
pub struct UiSubscriber {
    receivers: [Receiver<UiUpdate>; 2],
    _alive: Arc<()>,
}

/// Create a connected publisher/subscriber pair with `capacity` slots per eye
#[must_use]
pub fn ui_channel(capacity: usize) -> (UiPublisher, UiSubscriber) {
    let (left_tx, left_rx) = bounded(capacity.max(1));
    let (right_tx, right_rx) = bounded(capacity.max(1));
    let alive = Arc::new(());
    let publisher = UiPublisher {
        queues: [
            EyeQueue {
                sender: left_tx,
                evictor: left_rx.clone(),
            },
            EyeQueue {
                sender: right_tx,
                evictor: right_rx.clone(),
            },
        ],
        consumer: Arc::downgrade(&alive),
        closed: false,
    };
    let subscriber = UiSubscriber {
        receivers: [left_rx, right_rx],
        _alive: alive,
    };
    (publisher, subscriber)
}

impl UiPublisher {
    /// Queue an update without blocking; returns false once the UI is gone
    pub fn publish(&mut self, update: UiUpdate) -> bool {
        if self.closed {
            return false;
        }
        if self.consumer.strong_count() == 0 {
            debug!("UI consumer gone, no further coordinate updates");
            self.closed = true;
            return false;
        }
        let queue = &self.queues[update.eye.index()];
        let mut pending = update;
        loop {
            match queue.sender.try_send(pending) {
                Ok(()) => return true,
                Err(TrySendError::Full(rejected)) => {
                    // Drop the oldest update and retry with the new one
                    let _ = queue.evictor.try_recv();
                    pending = rejected;
                }
                Err(TrySendError::Disconnected(_)) => {
                    self.closed = true;
                    return false;
                }
            }
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl UiSubscriber {
    /// Receiver for one eye's updates
    #[must_use]
    pub fn receiver(&self, eye: Eye) -> &Receiver<UiUpdate> {
        &self.receivers[eye.index()]
    }

    /// Most recent pending update for an eye, discarding older ones
    #[must_use]
    pub fn latest(&self, eye: Eye) -> Option<UiUpdate> {
        self.receivers[eye.index()].try_iter().last()
    }
}
