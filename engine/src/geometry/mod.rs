//! Scene geometry: collider primitives, ray intersection and the flattened scene

pub mod collider;
pub mod intersect;
pub mod scene;

pub use collider::{Collider, ColliderGroup, ColliderShape, Surface};
pub use intersect::{reflect, Ray, SURFACE_EPSILON};
pub use scene::{PermeationFalloff, SceneGeometry, SceneHit};
