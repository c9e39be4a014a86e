//! Per-ray bounce loop with its secondary visibility tests

use super::accumulator::BatchAccumulators;
use super::batch::RayRecord;
use crate::config::RayTraceConfig;
use crate::geometry::{reflect, Ray, SceneGeometry, Surface, SURFACE_EPSILON};
use crate::target::TargetSnapshot;
use glam::Vec3;

/// Read-only inputs shared by every batch of a cycle
pub struct TraceContext<'a> {
    pub scene: &'a SceneGeometry,
    pub listener: Vec3,
    pub targets: &'a [TargetSnapshot],
    pub config: &'a RayTraceConfig,
    /// Straight-line permeation strength from the listener to each target
    pub permeation: Vec<f32>,
}

/// Bounce one ray through the scene, feeding the batch's accumulators
///
/// At every hit the bounce point is tested against the listener (echo) and
/// every target (muffle, direction). The first hit also contributes the
/// permeation strength of each target. Returns the number of hits.
pub(crate) fn trace_ray(
    ctx: &TraceContext<'_>,
    direction: Vec3,
    slot: &mut BatchAccumulators,
    mut records: Option<&mut [RayRecord]>,
) -> u32 {
    let max_distance = ctx.config.max_ray_distance;
    let max_hits = ctx.config.hits_per_ray();
    let Some(mut ray) = Ray::new(ctx.listener, direction) else {
        return 0;
    };

    let mut traveled = 0.0;
    let mut hits = 0usize;
    let mut first_point: Option<Vec3> = None;

    while hits < max_hits && traveled < max_distance {
        let Some(hit) = ctx.scene.closest_hit(&ray, max_distance - traveled) else {
            // Out of bounds
            break;
        };

        let point = ray.at(hit.distance);
        traveled += hit.distance;
        let sample_point = point - ray.direction * SURFACE_EPSILON;
        let apparent_position = *first_point.get_or_insert(point) - ctx.listener;

        let to_listener = sample_point.distance(ctx.listener);
        let returns = ctx.scene.is_path_clear(sample_point, ctx.listener, None);
        slot.echo.add_sample(returns, traveled + to_listener);

        for (target, acc) in ctx.targets.iter().zip(slot.targets.iter_mut()) {
            let path_length = traveled + sample_point.distance(target.position);
            let visible = ctx.scene.is_path_clear(sample_point, target.position, Some(target.id));
            acc.muffle.add_sample(visible, path_length);
            if visible {
                acc.direction.add_sample(apparent_position, path_length);
            }
        }

        if hits == 0 {
            for (strength, acc) in ctx.permeation.iter().zip(slot.targets.iter_mut()) {
                acc.permeation.add_sample(*strength);
            }
        }

        if let Some(slots) = records.as_deref_mut() {
            slots[hits] = RayRecord {
                distance: hit.distance,
                collider: Some(hit.collider),
                audio_target: hit.audio_target,
                point,
            };
        }
        hits += 1;

        // Target geometry absorbs the ray
        if hit.audio_target.is_some() {
            break;
        }

        let collider = &ctx.scene.colliders()[hit.collider];
        match collider.surface {
            Surface::Reflective { absorption } => {
                traveled += max_distance * absorption;
                let reflected = reflect(ray.direction, collider.surface_normal(point));
                match Ray::new(point + reflected * SURFACE_EPSILON, reflected) {
                    Some(next) => ray = next,
                    None => break,
                }
            }
            Surface::PassThrough { absorption } => {
                traveled += max_distance * absorption * 0.5;
                ray.origin = point + ray.direction * SURFACE_EPSILON;
            }
        }
    }

    hits as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Collider, ColliderGroup};
    use crate::target::AudioTargetId;

    fn context<'a>(
        scene: &'a SceneGeometry,
        targets: &'a [TargetSnapshot],
        config: &'a RayTraceConfig,
    ) -> TraceContext<'a> {
        TraceContext {
            scene,
            listener: Vec3::ZERO,
            targets,
            config,
            permeation: vec![0.5; targets.len()],
        }
    }

    #[test]
    fn test_ray_into_empty_space_has_no_hits() {
        let scene = SceneGeometry::new();
        let config = RayTraceConfig::default();
        let ctx = context(&scene, &[], &config);
        let mut slot = BatchAccumulators::new(0);

        assert_eq!(trace_ray(&ctx, Vec3::X, &mut slot, None), 0);
        assert_eq!(slot.echo.total_rays, 0);
    }

    #[test]
    fn test_ray_reflects_between_walls() {
        let walls = ColliderGroup::new("corridor")
            .with_collider(Collider::aabb(Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.5, 5.0, 5.0)))
            .with_collider(Collider::aabb(Vec3::new(-2.0, 0.0, 0.0), Vec3::new(0.5, 5.0, 5.0)));
        let scene = SceneGeometry::build([&walls], []).unwrap();
        let config = RayTraceConfig::new().max_bounces(3).max_ray_distance(100.0);
        let ctx = context(&scene, &[], &config);
        let mut slot = BatchAccumulators::new(0);
        let mut records = vec![RayRecord::default(); config.hits_per_ray()];

        let hits = trace_ray(&ctx, Vec3::X, &mut slot, Some(&mut records));
        assert_eq!(hits, 4);
        assert_eq!(records[0].collider, Some(0));
        assert_eq!(records[1].collider, Some(1));
        assert_eq!(records[2].collider, Some(0));
        assert!((records[0].distance - 1.5).abs() < 1e-3);
        assert!((records[1].distance - 3.0).abs() < 1e-3);
        // Every bounce point sees the listener
        assert_eq!(slot.echo.returned, 4);
    }

    #[test]
    fn test_distance_budget_stops_ray() {
        let walls = ColliderGroup::new("corridor")
            .with_collider(Collider::aabb(Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.5, 5.0, 5.0)))
            .with_collider(Collider::aabb(Vec3::new(-2.0, 0.0, 0.0), Vec3::new(0.5, 5.0, 5.0)));
        let scene = SceneGeometry::build([&walls], []).unwrap();
        // First hit at 1.5, second at 4.5, third would be at 7.5
        let config = RayTraceConfig::new().max_bounces(10).max_ray_distance(6.0);
        let ctx = context(&scene, &[], &config);
        let mut slot = BatchAccumulators::new(0);

        assert_eq!(trace_ray(&ctx, Vec3::X, &mut slot, None), 2);
    }

    #[test]
    fn test_absorption_consumes_budget() {
        let wall = ColliderGroup::new("soft").with_collider(
            Collider::aabb(Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.5, 5.0, 5.0))
                .with_surface(Surface::Reflective { absorption: 1.0 }),
        );
        let back = ColliderGroup::new("back")
            .with_collider(Collider::aabb(Vec3::new(-2.0, 0.0, 0.0), Vec3::new(0.5, 5.0, 5.0)));
        let scene = SceneGeometry::build([&wall, &back], []).unwrap();
        let config = RayTraceConfig::new().max_bounces(5).max_ray_distance(50.0);
        let ctx = context(&scene, &[], &config);
        let mut slot = BatchAccumulators::new(0);

        assert_eq!(trace_ray(&ctx, Vec3::X, &mut slot, None), 1);
    }

    #[test]
    fn test_pass_through_wall_is_crossed() {
        let curtain = ColliderGroup::new("curtain").with_collider(
            Collider::aabb(Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.25, 5.0, 5.0))
                .with_surface(Surface::PassThrough { absorption: 0.1 }),
        );
        let back = ColliderGroup::new("back")
            .with_collider(Collider::aabb(Vec3::new(6.0, 0.0, 0.0), Vec3::new(0.5, 5.0, 5.0)));
        let scene = SceneGeometry::build([&curtain, &back], []).unwrap();
        let config = RayTraceConfig::new().max_bounces(3).max_ray_distance(100.0);
        let ctx = context(&scene, &[], &config);
        let mut slot = BatchAccumulators::new(0);
        let mut records = vec![RayRecord::default(); config.hits_per_ray()];

        trace_ray(&ctx, Vec3::X, &mut slot, Some(&mut records));
        // Entry, exit, then the back wall
        assert_eq!(records[0].collider, Some(0));
        assert_eq!(records[1].collider, Some(0));
        assert_eq!(records[2].collider, Some(1));
        assert!((records[2].point.x - 5.5).abs() < 1e-3);
    }

    #[test]
    fn test_target_hit_ends_ray_and_counts_as_visible() {
        let speaker = ColliderGroup::new("speaker")
            .with_collider(Collider::sphere(Vec3::new(5.0, 0.0, 0.0), 1.0));
        let scene = SceneGeometry::build([], [(AudioTargetId(0), &speaker)]).unwrap();
        let targets = [TargetSnapshot {
            id: AudioTargetId(0),
            position: Vec3::new(5.0, 0.0, 0.0),
        }];
        let config = RayTraceConfig::default();
        let ctx = context(&scene, &targets, &config);
        let mut slot = BatchAccumulators::new(1);

        assert_eq!(trace_ray(&ctx, Vec3::X, &mut slot, None), 1);
        let acc = slot.targets[0];
        assert_eq!(acc.muffle.hit_count, 1);
        assert!((acc.muffle.total_distance - 5.0).abs() < 1e-3);
        assert_eq!(acc.permeation.samples, 1);
        let direction = acc.direction.average().unwrap();
        assert!((direction - Vec3::new(4.0, 0.0, 0.0)).length() < 1e-3);
    }

    #[test]
    fn test_occluded_target_is_not_visible() {
        let env = ColliderGroup::new("room")
            .with_collider(Collider::aabb(Vec3::new(0.0, -2.0, 0.0), Vec3::new(10.0, 0.5, 10.0)))
            .with_collider(Collider::aabb(Vec3::new(3.0, 0.0, 0.0), Vec3::new(0.5, 10.0, 10.0)));
        let scene = SceneGeometry::build([&env], []).unwrap();
        let targets = [TargetSnapshot {
            id: AudioTargetId(0),
            position: Vec3::new(6.0, 0.0, 0.0),
        }];
        let config = RayTraceConfig::new().max_bounces(0);
        let ctx = context(&scene, &targets, &config);
        let mut slot = BatchAccumulators::new(1);

        // Straight down onto the floor, the wall hides the target
        trace_ray(&ctx, -Vec3::Y, &mut slot, None);
        assert_eq!(slot.targets[0].muffle.total_rays, 1);
        assert_eq!(slot.targets[0].muffle.hit_count, 0);
        assert!(slot.targets[0].direction.average().is_none());
    }
}
