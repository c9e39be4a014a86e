//! Batched, data-parallel acoustic ray tracer
//!
//! A cycle splits the direction table into fixed-size batches and traces a
//! capped run of them in parallel. Each batch writes only to its own arena
//! slot, so no locks are needed. Batches left out of a cycle keep their
//! previous slot contents.

pub mod accumulator;
pub mod batch;
pub mod bounce;

pub use accumulator::{
    BatchAccumulators, DirectionAccumulator, EchoAccumulator, MuffleAccumulator,
    PermeationAccumulator, TargetAccumulators,
};
pub use batch::{BatchSchedule, CycleBuffers, RayRecord};
pub use bounce::TraceContext;

use crate::config::RayTraceConfig;
use crate::geometry::{PermeationFalloff, SceneGeometry};
use crate::profile_zone;
use crate::target::TargetSnapshot;
use glam::Vec3;
use rayon::prelude::*;
use tracing::debug;

/// Speed of sound in air (m/s)
pub const SPEED_OF_SOUND: f32 = 343.0;

/// Reflections returning to the listener
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EchoEstimate {
    /// Fraction of bounce points with a clear path back to the listener
    pub strength: f32,
    /// Mean travel time of the returning paths
    pub delay_seconds: f32,
}

impl EchoEstimate {
    pub fn from_accumulator(echo: &EchoAccumulator) -> Self {
        Self {
            strength: echo.return_fraction(),
            delay_seconds: echo.average_distance() / SPEED_OF_SOUND,
        }
    }
}

/// Summary of one traced cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleStats {
    /// Batches traced this cycle
    pub batches: usize,
    /// First batch of the run
    pub first_batch: usize,
    pub rays: usize,
    /// Hits over all traced rays
    pub bounces: u64,
}

/// Trace the next run of batches into `buffers`
///
/// Buffers are resized first if the configuration or the target count
/// changed. Arena slot `b` holds the latest trace of batch `b`.
pub fn trace_cycle(
    scene: &SceneGeometry,
    listener: Vec3,
    targets: &[TargetSnapshot],
    config: &RayTraceConfig,
    buffers: &mut CycleBuffers,
) -> CycleStats {
    profile_zone!("trace_cycle");

    buffers.ensure(config, targets.len());

    let falloff = PermeationFalloff::from_config(config);
    let ctx = TraceContext {
        scene,
        listener,
        targets,
        config,
        permeation: targets
            .iter()
            .map(|target| {
                scene.permeation_strength(listener, target.position, Some(target.id), &falloff)
            })
            .collect(),
    };

    let (directions, mut jobs) = buffers.batch_jobs(config);
    let bounces: u64 = jobs
        .par_iter_mut()
        .map(|job| job.run(&ctx, directions))
        .sum();

    let stats = CycleStats {
        batches: jobs.len(),
        first_batch: jobs.first().map_or(0, |job| job.batch),
        rays: jobs.iter().map(|job| job.bounce_counts.len()).sum(),
        bounces,
    };

    debug!(
        batches = stats.batches,
        first_batch = stats.first_batch,
        rays = stats.rays,
        bounces = stats.bounces,
        colliders = scene.len(),
        "Trace cycle finished"
    );
    stats
}
