//! Collider primitives that make up the acoustic scene

use crate::error::{AcousticsError, Result};
use crate::target::AudioTargetId;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Collider shape types, all centered on the collider's world position
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum ColliderShape {
    /// Axis-aligned box with half-extents
    Aabb { half_extents: Vec3 },
    /// Rotated box with half-extents and a unit rotation
    Obb { half_extents: Vec3, rotation: Quat },
    /// Sphere with radius
    Sphere { radius: f32 },
}

impl ColliderShape {
    /// Rotation from local to world space
    pub fn rotation(&self) -> Quat {
        match self {
            ColliderShape::Obb { rotation, .. } => *rotation,
            _ => Quat::IDENTITY,
        }
    }
}

/// How a surface responds to an incoming ray
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Surface {
    /// Mirror reflection; `absorption` in [0, 1] of the ray budget is spent per hit
    Reflective { absorption: f32 },
    /// The ray passes straight through, paying half the absorption on entry and half on exit
    PassThrough { absorption: f32 },
}

impl Default for Surface {
    fn default() -> Self {
        Surface::Reflective { absorption: 0.0 }
    }
}

impl Surface {
    pub fn absorption(&self) -> f32 {
        match self {
            Surface::Reflective { absorption } | Surface::PassThrough { absorption } => *absorption,
        }
    }
}

fn default_thickness() -> f32 {
    1.0
}

/// A single world-space collider
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Collider {
    pub center: Vec3,
    pub shape: ColliderShape,
    #[serde(default)]
    pub surface: Surface,
    /// Multiplier applied to the in-collider path length during permeation
    #[serde(default = "default_thickness")]
    pub thickness: f32,
    /// Owning audio target, `None` for environment geometry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_target: Option<AudioTargetId>,
}

impl Collider {
    pub fn new(center: Vec3, shape: ColliderShape) -> Self {
        Self {
            center,
            shape,
            surface: Surface::default(),
            thickness: default_thickness(),
            audio_target: None,
        }
    }

    pub fn aabb(center: Vec3, half_extents: Vec3) -> Self {
        Self::new(center, ColliderShape::Aabb { half_extents })
    }

    pub fn obb(center: Vec3, half_extents: Vec3, rotation: Quat) -> Self {
        Self::new(
            center,
            ColliderShape::Obb {
                half_extents,
                rotation,
            },
        )
    }

    pub fn sphere(center: Vec3, radius: f32) -> Self {
        Self::new(center, ColliderShape::Sphere { radius })
    }

    pub fn with_surface(mut self, surface: Surface) -> Self {
        self.surface = surface;
        self
    }

    pub fn with_thickness(mut self, thickness: f32) -> Self {
        self.thickness = thickness;
        self
    }

    pub fn owned_by(mut self, target: AudioTargetId) -> Self {
        self.audio_target = Some(target);
        self
    }

    /// Transform a world-space point into the collider's local frame
    pub fn to_local(&self, point: Vec3) -> Vec3 {
        self.shape.rotation().inverse() * (point - self.center)
    }

    /// Reject sizes and parameters that would poison the intersection math
    pub fn validate(&self) -> Result<()> {
        if !self.center.is_finite() {
            return Err(invalid(format!("center {} is not finite", self.center)));
        }
        match self.shape {
            ColliderShape::Aabb { half_extents } => check_extents(half_extents)?,
            ColliderShape::Obb {
                half_extents,
                rotation,
            } => {
                check_extents(half_extents)?;
                if !rotation.is_finite() || !rotation.is_normalized() {
                    return Err(invalid(format!("rotation {rotation} is not a unit quaternion")));
                }
            }
            ColliderShape::Sphere { radius } => {
                if !(radius.is_finite() && radius >= 0.0) {
                    return Err(invalid(format!("radius {radius} must be finite and >= 0")));
                }
            }
        }
        let absorption = self.surface.absorption();
        if !(0.0..=1.0).contains(&absorption) {
            return Err(invalid(format!("absorption {absorption} must be in [0, 1]")));
        }
        if !(self.thickness.is_finite() && self.thickness >= 0.0) {
            return Err(invalid(format!(
                "thickness {} must be finite and >= 0",
                self.thickness
            )));
        }
        Ok(())
    }
}

fn check_extents(half_extents: Vec3) -> Result<()> {
    if half_extents.is_finite() && half_extents.min_element() >= 0.0 {
        Ok(())
    } else {
        Err(invalid(format!(
            "half extents {half_extents} must be finite and >= 0"
        )))
    }
}

fn invalid(message: String) -> AcousticsError {
    AcousticsError::InvalidCollider(message)
}

/// A named set of world-space colliders registered together
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ColliderGroup {
    pub name: String,
    #[serde(default)]
    pub colliders: Vec<Collider>,
}

impl ColliderGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            colliders: Vec::new(),
        }
    }

    pub fn with_collider(mut self, collider: Collider) -> Self {
        self.colliders.push(collider);
        self
    }

    pub fn len(&self) -> usize {
        self.colliders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_colliders() {
        assert!(Collider::aabb(Vec3::ZERO, Vec3::ONE).validate().is_ok());
        assert!(Collider::sphere(Vec3::X, 0.5).validate().is_ok());
        assert!(
            Collider::obb(Vec3::ZERO, Vec3::ONE, Quat::from_rotation_y(0.3))
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn test_negative_extents_rejected() {
        let result = Collider::aabb(Vec3::ZERO, Vec3::new(1.0, -1.0, 1.0)).validate();
        assert!(matches!(result, Err(AcousticsError::InvalidCollider(_))));
        assert!(Collider::sphere(Vec3::ZERO, -0.1).validate().is_err());
        assert!(Collider::sphere(Vec3::ZERO, f32::NAN).validate().is_err());
    }

    #[test]
    fn test_unnormalized_rotation_rejected() {
        let rotation = Quat::from_xyzw(0.0, 0.0, 0.0, 2.0);
        assert!(Collider::obb(Vec3::ZERO, Vec3::ONE, rotation).validate().is_err());
    }

    #[test]
    fn test_absorption_range() {
        let collider = Collider::aabb(Vec3::ZERO, Vec3::ONE)
            .with_surface(Surface::PassThrough { absorption: 1.5 });
        assert!(collider.validate().is_err());
    }

    #[test]
    fn test_collider_json_defaults() {
        let json = r#"{ "center": [1.0, 2.0, 3.0], "shape": { "Sphere": { "radius": 2.0 } } }"#;
        let collider: Collider = serde_json::from_str(json).unwrap();
        assert_eq!(collider.surface, Surface::default());
        assert_eq!(collider.thickness, 1.0);
        assert_eq!(collider.audio_target, None);
    }

    #[test]
    fn test_to_local_undoes_rotation() {
        let collider = Collider::obb(
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::ONE,
            Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
        );
        let world = collider.center + collider.shape.rotation() * Vec3::new(0.5, 0.0, 0.0);
        let local = collider.to_local(world);
        assert!((local - Vec3::new(0.5, 0.0, 0.0)).length() < 1e-5);
    }
}
