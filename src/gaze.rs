//! Mapping smoothed gaze deltas onto the avatar's eye meshes.
//!
//! The mapper does no filtering of its own. It decides which mesh each delta
//! rotates and forwards it to a [`GazeRenderer`]. Renderers compose the
//! delta with the mesh's current orientation: pitch about the horizontal
//! axis, then yaw about the vertical axis.

use crate::iris::Eye;
use crate::smoothing::GazeDelta;
use crate::{Error, Result};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{debug, warn};
use nalgebra::{UnitQuaternion, Vector3};

/// Which observations drive which eye mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GazeDrive {
    /// One eye's deltas rotate both meshes; the other eye is ignored
    LeadingEye(Eye),
    /// Each eye's deltas rotate its own mesh
    PerEye,
}

impl Default for GazeDrive {
    fn default() -> Self {
        Self::LeadingEye(Eye::Left)
    }
}

/// Incremental rotation for one eye mesh, in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GazeCommand {
    pub mesh: Eye,
    pub yaw_delta: f64,
    pub pitch_delta: f64,
}

/// Consumer of gaze rotation deltas
///
/// Calls must not block the capture thread for longer than it takes to hand
/// the delta off.
pub trait GazeRenderer: Send {
    /// Rotate `mesh` by the given deltas on top of its current orientation
    ///
    /// # Errors
    ///
    /// Returns an error if the renderer has gone away
    fn apply_gaze_delta(&mut self, mesh: Eye, yaw_delta: f64, pitch_delta: f64) -> Result<()>;

    /// Deliver rotation held back by earlier calls, if any
    ///
    /// # Errors
    ///
    /// Returns an error if the renderer has gone away
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Routes per-eye deltas to the renderer
pub struct GazeMapper {
    drive: GazeDrive,
    renderer: Box<dyn GazeRenderer>,
    connected: bool,
}

impl GazeMapper {
    #[must_use]
    pub fn new(drive: GazeDrive, renderer: Box<dyn GazeRenderer>) -> Self {
        Self {
            drive,
            renderer,
            connected: true,
        }
    }

    /// Forward one eye's delta; returns the commands that were issued
    pub fn apply(&mut self, eye: Eye, delta: GazeDelta) -> Vec<GazeCommand> {
        let meshes: &[Eye] = match self.drive {
            GazeDrive::LeadingEye(leader) if leader == eye => &Eye::BOTH,
            GazeDrive::LeadingEye(_) => &[],
            GazeDrive::PerEye if eye == Eye::Left => &[Eye::Left],
            GazeDrive::PerEye => &[Eye::Right],
        };
        if !self.connected {
            return Vec::new();
        }

        let mut issued = Vec::with_capacity(meshes.len());
        for &mesh in meshes {
            match self.renderer.apply_gaze_delta(mesh, delta.yaw, delta.pitch) {
                Ok(()) => issued.push(GazeCommand {
                    mesh,
                    yaw_delta: delta.yaw,
                    pitch_delta: delta.pitch,
                }),
                Err(e) => {
                    warn!("Renderer unavailable, dropping further gaze updates: {e}");
                    self.connected = false;
                    break;
                }
            }
        }
        issued
    }

    /// Retry rotation the renderer could not take earlier
    pub fn flush(&mut self) {
        if !self.connected {
            return;
        }
        if let Err(e) = self.renderer.flush() {
            warn!("Renderer unavailable, dropping further gaze updates: {e}");
            self.connected = false;
        }
    }

    #[must_use]
    pub fn drive(&self) -> GazeDrive {
        self.drive
    }
}

/// Renderer handle that queues commands for a render thread
///
/// Sending never blocks. When the queue is full the delta is added to a
/// per-mesh backlog and sent with the next command for that mesh, so the
/// sum of delivered deltas always catches up with the smoothed angles.
#[derive(Debug, Clone)]
pub struct ChannelRenderer {
    sender: Sender<GazeCommand>,
    backlog: [(f64, f64); 2],
}

impl ChannelRenderer {
    /// Create a renderer handle and the receiving end for the render thread
    #[must_use]
    pub fn new(capacity: usize) -> (Self, Receiver<GazeCommand>) {
        let (sender, receiver) = bounded(capacity.max(1));
        (
            Self {
                sender,
                backlog: [(0.0, 0.0); 2],
            },
            receiver,
        )
    }

    /// Rotation of `mesh` not yet handed to the render thread
    #[must_use]
    pub fn backlog(&self, mesh: Eye) -> (f64, f64) {
        self.backlog[mesh.index()]
    }

    fn send_backlog(&mut self, mesh: Eye) -> Result<()> {
        let (yaw_delta, pitch_delta) = self.backlog[mesh.index()];
        let command = GazeCommand {
            mesh,
            yaw_delta,
            pitch_delta,
        };
        match self.sender.try_send(command) {
            Ok(()) => {
                self.backlog[mesh.index()] = (0.0, 0.0);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                debug!("Render queue full, holding {mesh} eye delta for the next send");
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(Error::ChannelClosed("render thread".to_string())),
        }
    }
}

impl GazeRenderer for ChannelRenderer {
    fn apply_gaze_delta(&mut self, mesh: Eye, yaw_delta: f64, pitch_delta: f64) -> Result<()> {
        let backlog = &mut self.backlog[mesh.index()];
        backlog.0 += yaw_delta;
        backlog.1 += pitch_delta;
        self.send_backlog(mesh)
    }

    fn flush(&mut self) -> Result<()> {
        for mesh in Eye::BOTH {
            if self.backlog(mesh) != (0.0, 0.0) {
                self.send_backlog(mesh)?;
            }
        }
        Ok(())
    }
}

/// Renderer-side orientation of both eye meshes
#[derive(Debug, Clone, PartialEq)]
pub struct AvatarEyes {
    orientations: [UnitQuaternion<f64>; 2],
}

impl Default for AvatarEyes {
    fn default() -> Self {
        Self {
            orientations: [UnitQuaternion::identity(); 2],
        }
    }
}

impl AvatarEyes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compose a delta (degrees) with the current orientation of `mesh`
    pub fn rotate(&mut self, mesh: Eye, yaw_delta: f64, pitch_delta: f64) {
        let pitch = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), pitch_delta.to_radians());
        let yaw = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), yaw_delta.to_radians());
        let current = &mut self.orientations[mesh.index()];
        *current = *current * pitch * yaw;
    }

    /// Apply a queued command
    pub fn apply(&mut self, command: &GazeCommand) {
        self.rotate(command.mesh, command.yaw_delta, command.pitch_delta);
    }

    /// Apply every command currently queued, returning how many were applied
    pub fn drain(&mut self, receiver: &Receiver<GazeCommand>) -> usize {
        let mut applied = 0;
        for command in receiver.try_iter() {
            self.apply(&command);
            applied += 1;
        }
        applied
    }

    #[must_use]
    pub fn orientation(&self, mesh: Eye) -> UnitQuaternion<f64> {
        self.orientations[mesh.index()]
    }

    /// Current `(yaw, pitch)` of `mesh` in degrees, about Y and X respectively
    #[must_use]
    pub fn gaze_degrees(&self, mesh: Eye) -> (f64, f64) {
        let (about_x, about_y, _) = self.orientations[mesh.index()].euler_angles();
        (about_y.to_degrees(), about_x.to_degrees())
    }
}

impl GazeRenderer for AvatarEyes {
    fn apply_gaze_delta(&mut self, mesh: Eye, yaw_delta: f64, pitch_delta: f64) -> Result<()> {
        self.rotate(mesh, yaw_delta, pitch_delta);
        Ok(())
    }
}
