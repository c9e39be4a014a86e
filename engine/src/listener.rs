//! Listener pose supplied by the host every update

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Position and orientation rays are traced from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Listener {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Listener {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

impl Listener {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Default forward is -Z
    pub fn forward(&self) -> Vec3 {
        (self.rotation * Vec3::NEG_Z).normalize()
    }

    pub fn right(&self) -> Vec3 {
        (self.rotation * Vec3::X).normalize()
    }

    /// Stereo pan of a listener-relative position
    ///
    /// The offset is flattened onto the horizontal plane and projected on the
    /// right vector: -1.0 = full left, 0.0 = center, 1.0 = full right.
    pub fn pan_towards(&self, relative: Vec3) -> f32 {
        let flat = Vec3::new(relative.x, 0.0, relative.z);
        // Source at (or straight above) the listener
        let Some(direction) = flat.try_normalize() else {
            return 0.0;
        };
        direction.dot(self.right()).clamp(-1.0, 1.0)
    }
}
