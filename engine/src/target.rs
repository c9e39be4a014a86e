//! Audio targets: sound-emitting objects tracked by the propagation engine

use crate::feedback::AudioTargetFeedback;
use crate::geometry::ColliderGroup;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Session-stable identifier of an audio target, assigned sequentially
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AudioTargetId(pub u32);

impl AudioTargetId {
    /// Index of this target in per-target arrays
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for AudioTargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result of one trace cycle for a single audio target
///
/// Overwritten wholesale every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AudioTargetSettings {
    /// 0 = fully audible, 1 = fully occluded
    pub muffle_strength: f32,
    /// Apparent source position relative to the listener, if any bounce point could see the target
    pub estimated_position: Option<Vec3>,
    /// Bounce points with a clear line to the target
    pub hit_count: u32,
}

/// Position of a target frozen at the moment a cycle is scheduled
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetSnapshot {
    pub id: AudioTargetId,
    pub position: Vec3,
}

/// A sound source registered with the engine
#[derive(Debug, Clone)]
pub struct AudioTarget {
    pub id: AudioTargetId,
    pub name: String,
    /// World position, supplied by the host every frame
    pub position: Vec3,
    /// Geometry owned by this target; rays reaching it count as arrivals
    pub colliders: ColliderGroup,
    /// Most recent cycle result
    pub settings: Option<AudioTargetSettings>,
    pub feedback: AudioTargetFeedback,
}

impl AudioTarget {
    pub fn snapshot(&self) -> TargetSnapshot {
        TargetSnapshot {
            id: self.id,
            position: self.position,
        }
    }
}
