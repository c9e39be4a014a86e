//! Ray intersection kernel for boxes and spheres

use super::collider::{Collider, ColliderShape};
use glam::Vec3;

/// Offset used to lift points off a surface before casting again
pub const SURFACE_EPSILON: f32 = 1e-4;

/// Ray for acoustic raycasting
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit direction
    pub direction: Vec3,
}

impl Ray {
    /// Create a new ray, returning `None` for a degenerate direction
    pub fn new(origin: Vec3, direction: Vec3) -> Option<Self> {
        direction.try_normalize().map(|direction| Self { origin, direction })
    }

    /// Get a point along the ray at distance t
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Slab test against a box centered at the origin
///
/// Returns the entry and exit distances along the ray. Axes the ray runs
/// parallel to are handled explicitly so no NaN reaches the comparisons.
fn box_interval(origin: Vec3, direction: Vec3, half_extents: Vec3) -> Option<(f32, f32)> {
    let mut t_near = f32::NEG_INFINITY;
    let mut t_far = f32::INFINITY;

    for axis in 0..3 {
        let o = origin[axis];
        let d = direction[axis];
        let h = half_extents[axis];

        if d.abs() < f32::EPSILON {
            if o < -h || o > h {
                return None;
            }
            continue;
        }

        let inv = 1.0 / d;
        let t1 = (-h - o) * inv;
        let t2 = (h - o) * inv;
        t_near = t_near.max(t1.min(t2));
        t_far = t_far.min(t1.max(t2));
    }

    if t_near > t_far || t_far < 0.0 {
        return None;
    }
    Some((t_near, t_far))
}

/// Quadratic ray-sphere test for a sphere centered at the origin
fn sphere_interval(origin: Vec3, direction: Vec3, radius: f32) -> Option<(f32, f32)> {
    let a = direction.dot(direction);
    let b = 2.0 * origin.dot(direction);
    let c = origin.dot(origin) - radius * radius;
    let discriminant = b * b - 4.0 * a * c;

    if discriminant < 0.0 || a <= 0.0 {
        return None;
    }

    let sqrt_discriminant = discriminant.sqrt();
    let t1 = (-b - sqrt_discriminant) / (2.0 * a);
    let t2 = (-b + sqrt_discriminant) / (2.0 * a);

    if t2 < 0.0 {
        return None;
    }
    Some((t1, t2))
}

impl Collider {
    /// Entry and exit distances of the ray through this collider
    ///
    /// The entry is negative when the ray starts inside.
    pub fn ray_interval(&self, ray: &Ray) -> Option<(f32, f32)> {
        match self.shape {
            ColliderShape::Aabb { half_extents } => {
                box_interval(ray.origin - self.center, ray.direction, half_extents)
            }
            ColliderShape::Obb {
                half_extents,
                rotation,
            } => box_interval(
                self.to_local(ray.origin),
                rotation.inverse() * ray.direction,
                half_extents,
            ),
            ColliderShape::Sphere { radius } => {
                sphere_interval(ray.origin - self.center, ray.direction, radius)
            }
        }
    }

    /// Distance to the first surface the ray meets
    ///
    /// The entry distance when the origin is outside, the exit distance when inside.
    pub fn intersect(&self, ray: &Ray) -> Option<f32> {
        self.ray_interval(ray)
            .map(|(t_near, t_far)| if t_near > 0.0 { t_near } else { t_far })
    }

    /// Outward surface normal at a point on (or near) the collider
    pub fn surface_normal(&self, point: Vec3) -> Vec3 {
        match self.shape {
            ColliderShape::Sphere { .. } => {
                (point - self.center).try_normalize().unwrap_or(Vec3::Y)
            }
            ColliderShape::Aabb { half_extents } => {
                closest_face_normal(point - self.center, half_extents)
            }
            ColliderShape::Obb {
                half_extents,
                rotation,
            } => rotation * closest_face_normal(self.to_local(point), half_extents),
        }
    }

    /// Length of the segment `from -> to` that lies inside this collider
    pub fn segment_inside_length(&self, from: Vec3, to: Vec3) -> f32 {
        let length = from.distance(to);
        let Some(ray) = Ray::new(from, to - from) else {
            return 0.0;
        };
        match self.ray_interval(&ray) {
            Some((t_near, t_far)) => (t_far.min(length) - t_near.max(0.0)).max(0.0),
            None => 0.0,
        }
    }
}

/// Normal of the box face closest to a local-space point
fn closest_face_normal(local: Vec3, half_extents: Vec3) -> Vec3 {
    let gap = half_extents - local.abs();
    let axis = if gap.x <= gap.y && gap.x <= gap.z {
        Vec3::X
    } else if gap.y <= gap.z {
        Vec3::Y
    } else {
        Vec3::Z
    };
    let sign = if local.dot(axis) < 0.0 { -1.0 } else { 1.0 };
    axis * sign
}

/// Mirror reflection of a direction about a unit normal
pub fn reflect(direction: Vec3, normal: Vec3) -> Vec3 {
    direction - 2.0 * direction.dot(normal) * normal
}
