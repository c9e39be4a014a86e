//! Flattened, read-only scene geometry queried by the tracer

use super::collider::{Collider, ColliderGroup};
use super::intersect::{Ray, SURFACE_EPSILON};
use crate::config::RayTraceConfig;
use crate::error::Result;
use crate::target::AudioTargetId;
use glam::Vec3;
use tracing::debug;

/// Closest collider along a ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneHit {
    pub distance: f32,
    /// Index into [`SceneGeometry::colliders`]
    pub collider: usize,
    pub audio_target: Option<AudioTargetId>,
}

/// Falloff constants of the straight-line permeation test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PermeationFalloff {
    /// Strength lost per unit of path inside geometry
    pub per_unit: f32,
    /// Strength lost per unit of total distance
    pub distance_per_unit: f32,
}

impl PermeationFalloff {
    pub fn from_config(config: &RayTraceConfig) -> Self {
        Self {
            per_unit: config.permeation_falloff_per_unit,
            distance_per_unit: config.distance_falloff_per_unit,
        }
    }
}

/// All registered colliders flattened into one tagged-union array
///
/// Built on scene-membership changes and shared read-only with trace cycles.
#[derive(Debug, Clone, Default)]
pub struct SceneGeometry {
    colliders: Vec<Collider>,
}

impl SceneGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flatten environment and target groups, tagging target geometry with its owner
    pub fn build<'a>(
        environment: impl IntoIterator<Item = &'a ColliderGroup>,
        targets: impl IntoIterator<Item = (AudioTargetId, &'a ColliderGroup)>,
    ) -> Result<Self> {
        let mut scene = Self::new();
        for group in environment {
            scene.push_group(group, None)?;
        }
        for (id, group) in targets {
            scene.push_group(group, Some(id))?;
        }
        debug!(colliders = scene.len(), "Built scene geometry");
        Ok(scene)
    }

    /// Validate and append every collider of a group
    pub fn push_group(
        &mut self,
        group: &ColliderGroup,
        owner: Option<AudioTargetId>,
    ) -> Result<()> {
        for collider in &group.colliders {
            collider.validate()?;
        }
        self.colliders.extend(group.colliders.iter().map(|collider| Collider {
            audio_target: owner,
            ..*collider
        }));
        Ok(())
    }

    pub fn colliders(&self) -> &[Collider] {
        &self.colliders
    }

    pub fn len(&self) -> usize {
        self.colliders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }

    /// Closest collider hit within `max_distance`
    pub fn closest_hit(&self, ray: &Ray, max_distance: f32) -> Option<SceneHit> {
        let mut closest: Option<SceneHit> = None;
        for (index, collider) in self.colliders.iter().enumerate() {
            let Some(distance) = collider.intersect(ray) else {
                continue;
            };
            if distance > max_distance {
                continue;
            }
            if closest.map_or(true, |hit| distance < hit.distance) {
                closest = Some(SceneHit {
                    distance,
                    collider: index,
                    audio_target: collider.audio_target,
                });
            }
        }
        closest
    }

    /// Whether `to` is reachable from `from` without crossing any collider
    ///
    /// Colliders owned by `exclude` are ignored so a target's own geometry
    /// never blocks rays aimed at that target.
    pub fn is_path_clear(&self, from: Vec3, to: Vec3, exclude: Option<AudioTargetId>) -> bool {
        let distance = from.distance(to);
        if distance < SURFACE_EPSILON {
            return true;
        }
        let Some(ray) = Ray::new(from, to - from) else {
            return true;
        };
        !self
            .colliders
            .iter()
            .filter(|collider| exclude.is_none() || collider.audio_target != exclude)
            .any(|collider| collider.intersect(&ray).is_some_and(|t| t < distance))
    }

    /// Remaining signal strength along the straight line `from -> to`
    ///
    /// `max(0, 1 - inside_length * per_unit - distance * distance_per_unit)`, where
    /// `inside_length` sums the thickness-weighted path through every collider.
    pub fn permeation_strength(
        &self,
        from: Vec3,
        to: Vec3,
        exclude: Option<AudioTargetId>,
        falloff: &PermeationFalloff,
    ) -> f32 {
        let distance = from.distance(to);
        let inside_length: f32 = self
            .colliders
            .iter()
            .filter(|collider| exclude.is_none() || collider.audio_target != exclude)
            .map(|collider| collider.segment_inside_length(from, to) * collider.thickness)
            .sum();
        (1.0 - inside_length * falloff.per_unit - distance * falloff.distance_per_unit).max(0.0)
    }
}
