//! Reduction of per-batch accumulators into per-target settings
//!
//! Runs after every batch of the cycle has finished. All arena slots are
//! merged in batch order, including batches traced on earlier cycles, so the
//! result is bit-identical between runs once every batch has been traced.
//! Never-traced slots are empty and merge as no-ops.

use crate::config::RayTraceConfig;
use crate::profile_zone;
use crate::target::{AudioTargetSettings, TargetSnapshot};
use crate::tracer::{BatchAccumulators, EchoAccumulator, EchoEstimate, TargetAccumulators};
use glam::Vec3;
use rayon::prelude::*;
use tracing::trace;

/// Settings for every target plus the listener echo of one cycle
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregatedCycle {
    pub settings: Vec<AudioTargetSettings>,
    pub echo: EchoEstimate,
}

/// Merge the given arena slots and derive the final settings
///
/// Permeation lowers the muffle strength and pulls the estimated position
/// toward the target's true relative position by the same amount.
pub fn aggregate(
    slots: &[BatchAccumulators],
    listener: Vec3,
    targets: &[TargetSnapshot],
    config: &RayTraceConfig,
) -> AggregatedCycle {
    profile_zone!("aggregate");

    let settings = (0..targets.len())
        .into_par_iter()
        .map(|index| {
            let mut merged = TargetAccumulators::default();
            for slot in slots {
                if let Some(acc) = slot.targets.get(index) {
                    merged.merge(acc);
                }
            }
            settle_target(&merged, targets[index].position - listener, config)
        })
        .collect::<Vec<_>>();

    let mut echo = EchoAccumulator::default();
    for slot in slots {
        echo.merge(&slot.echo);
    }

    AggregatedCycle {
        settings,
        echo: EchoEstimate::from_accumulator(&echo),
    }
}

fn settle_target(
    merged: &TargetAccumulators,
    relative_target: Vec3,
    config: &RayTraceConfig,
) -> AudioTargetSettings {
    let muffle = merged.muffle_strength(config);
    let reduction = merged.muffle_reduction(config);
    let muffle_strength = (muffle - reduction).clamp(0.0, 1.0);

    let estimated_position = match merged.direction.average() {
        Some(position) => Some(position + relative_target * reduction),
        None if reduction > 0.0 => Some(relative_target * reduction),
        None => None,
    };

    trace!(
        muffle,
        reduction,
        hits = merged.muffle.hit_count,
        "Aggregated audio target"
    );

    AudioTargetSettings {
        muffle_strength,
        estimated_position,
        hit_count: merged.muffle.hit_count,
    }
}
