//! Per-batch accumulators that collapse per-ray samples into a few numbers
//!
//! Every batch owns one [`BatchAccumulators`] slot. A slot is reset when its
//! batch starts tracing and is merged in batch order by the aggregation stage,
//! so results never depend on thread scheduling.

use crate::config::RayTraceConfig;
use glam::Vec3;

/// Hit statistics of bounce points that tried to reach a target
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MuffleAccumulator {
    pub total_distance: f32,
    pub hit_count: u32,
    pub total_rays: u32,
}

impl MuffleAccumulator {
    /// Record one visibility test; `distance` is the full path length to the target
    pub fn add_sample(&mut self, visible: bool, distance: f32) {
        if visible {
            self.total_distance += distance;
            self.hit_count += 1;
        }
        self.total_rays += 1;
    }

    pub fn merge(&mut self, other: &Self) {
        self.total_distance += other.total_distance;
        self.hit_count += other.hit_count;
        self.total_rays += other.total_rays;
    }

    /// 0 = fully clear, 1 = fully muffled
    ///
    /// Clarity is the hit fraction relative to `full_clarity_hit_percentage`
    /// times `full_clarity_distance` over the average path length, clamped to [0, 1].
    pub fn muffle_strength(
        &self,
        full_clarity_distance: f32,
        full_clarity_hit_percentage: f32,
    ) -> f32 {
        if self.total_rays == 0 || self.hit_count == 0 {
            return 1.0;
        }

        let hit_fraction = self.hit_count as f32 / self.total_rays as f32;
        let hit_factor = hit_fraction / full_clarity_hit_percentage;

        let average_distance = self.total_distance / self.hit_count as f32;
        let distance_factor = full_clarity_distance / average_distance.max(f32::EPSILON);

        1.0 - (hit_factor * distance_factor).clamp(0.0, 1.0)
    }
}

/// Inverse-distance weighted sum of apparent source positions
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DirectionAccumulator {
    pub weighted_sum: Vec3,
    pub total_weight: f32,
}

impl DirectionAccumulator {
    /// Add a listener-relative position seen over a path of length `distance`
    pub fn add_sample(&mut self, relative_position: Vec3, distance: f32) {
        if distance <= f32::EPSILON {
            return;
        }
        let weight = 1.0 / distance;
        self.weighted_sum += relative_position * weight;
        self.total_weight += weight;
    }

    pub fn merge(&mut self, other: &Self) {
        self.weighted_sum += other.weighted_sum;
        self.total_weight += other.total_weight;
    }

    /// Weighted average position, `None` when nothing contributed
    pub fn average(&self) -> Option<Vec3> {
        if self.total_weight <= 0.0 {
            return None;
        }
        Some(self.weighted_sum / self.total_weight)
    }
}

/// Remaining straight-line strength summed over first-hit rays
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PermeationAccumulator {
    pub accumulated: f32,
    pub samples: u32,
}

impl PermeationAccumulator {
    pub fn add_sample(&mut self, strength: f32) {
        self.accumulated += strength;
        self.samples += 1;
    }

    pub fn merge(&mut self, other: &Self) {
        self.accumulated += other.accumulated;
        self.samples += other.samples;
    }

    /// Muffle reduction in [0, `reduction_percent`]
    pub fn muffle_reduction(&self, full_reduction_strength: f32, reduction_percent: f32) -> f32 {
        if self.samples == 0 || full_reduction_strength <= 0.0 {
            return 0.0;
        }
        let average = self.accumulated / (full_reduction_strength * self.samples as f32);
        average.clamp(0.0, 1.0) * reduction_percent
    }
}

/// Return rays from bounce points back to the listener
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EchoAccumulator {
    pub total_distance: f32,
    pub returned: u32,
    pub total_rays: u32,
}

impl EchoAccumulator {
    pub fn add_sample(&mut self, visible: bool, path_length: f32) {
        if visible {
            self.total_distance += path_length;
            self.returned += 1;
        }
        self.total_rays += 1;
    }

    pub fn merge(&mut self, other: &Self) {
        self.total_distance += other.total_distance;
        self.returned += other.returned;
        self.total_rays += other.total_rays;
    }

    /// Fraction of bounce points that could hear the listener
    pub fn return_fraction(&self) -> f32 {
        if self.total_rays == 0 {
            return 0.0;
        }
        self.returned as f32 / self.total_rays as f32
    }

    /// Mean length of the returning paths
    pub fn average_distance(&self) -> f32 {
        if self.returned == 0 {
            return 0.0;
        }
        self.total_distance / self.returned as f32
    }
}

/// Accumulators for one (batch, audio target) pair
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TargetAccumulators {
    pub muffle: MuffleAccumulator,
    pub direction: DirectionAccumulator,
    pub permeation: PermeationAccumulator,
}

impl TargetAccumulators {
    pub fn merge(&mut self, other: &Self) {
        self.muffle.merge(&other.muffle);
        self.direction.merge(&other.direction);
        self.permeation.merge(&other.permeation);
    }

    pub fn muffle_strength(&self, config: &RayTraceConfig) -> f32 {
        self.muffle
            .muffle_strength(config.full_clarity_distance, config.full_clarity_hit_percentage)
    }

    pub fn muffle_reduction(&self, config: &RayTraceConfig) -> f32 {
        self.permeation.muffle_reduction(
            config.full_muffle_reduction_strength,
            config.muffle_reduction_percent,
        )
    }
}

/// Arena slot owned exclusively by one batch during a cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchAccumulators {
    pub targets: Vec<TargetAccumulators>,
    pub echo: EchoAccumulator,
}

impl BatchAccumulators {
    pub fn new(target_count: usize) -> Self {
        Self {
            targets: vec![TargetAccumulators::default(); target_count],
            echo: EchoAccumulator::default(),
        }
    }

    /// Zero every accumulator so nothing leaks from a previous cycle
    pub fn reset(&mut self) {
        self.targets.fill(TargetAccumulators::default());
        self.echo = EchoAccumulator::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_muffle_without_hits_is_full() {
        let mut acc = MuffleAccumulator::default();
        assert_eq!(acc.muffle_strength(10.0, 0.5), 1.0);
        for _ in 0..20 {
            acc.add_sample(false, 3.0);
        }
        assert_eq!(acc.muffle_strength(10.0, 0.5), 1.0);
    }

    #[test]
    fn test_full_clarity_gives_zero_muffle() {
        let mut acc = MuffleAccumulator::default();
        for _ in 0..10 {
            acc.add_sample(true, 8.0);
        }
        assert_eq!(acc.muffle_strength(10.0, 0.5), 0.0);
    }

    #[test]
    fn test_partial_clarity() {
        let mut acc = MuffleAccumulator::default();
        // 25% hits at twice the full clarity distance
        acc.add_sample(true, 20.0);
        for _ in 0..3 {
            acc.add_sample(false, 0.0);
        }
        let muffle = acc.muffle_strength(10.0, 0.5);
        // hit factor 0.5, distance factor 0.5
        assert!((muffle - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_direction_weights_closer_samples() {
        let mut acc = DirectionAccumulator::default();
        assert!(acc.average().is_none());

        acc.add_sample(Vec3::X, 1.0);
        acc.add_sample(Vec3::Z, 3.0);
        let average = acc.average().unwrap();
        assert!((average - Vec3::new(0.75, 0.0, 0.25)).length() < 1e-6);
    }

    #[test]
    fn test_direction_ignores_zero_distance() {
        let mut acc = DirectionAccumulator::default();
        acc.add_sample(Vec3::X, 0.0);
        assert!(acc.average().is_none());
    }

    #[test]
    fn test_permeation_reduction() {
        let mut acc = PermeationAccumulator::default();
        assert_eq!(acc.muffle_reduction(1.0, 0.5), 0.0);

        acc.add_sample(0.4);
        acc.add_sample(0.4);
        assert!((acc.muffle_reduction(1.0, 0.5) - 0.2).abs() < 1e-6);
        // Saturates at the reduction cap
        assert!((acc.muffle_reduction(0.1, 0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_echo_fraction_and_distance() {
        let mut acc = EchoAccumulator::default();
        assert_eq!(acc.return_fraction(), 0.0);
        assert_eq!(acc.average_distance(), 0.0);

        acc.add_sample(true, 4.0);
        acc.add_sample(true, 6.0);
        acc.add_sample(false, 100.0);
        acc.add_sample(false, 100.0);
        assert!((acc.return_fraction() - 0.5).abs() < 1e-6);
        assert!((acc.average_distance() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_merge_matches_single_accumulator() {
        let mut whole = MuffleAccumulator::default();
        let mut a = MuffleAccumulator::default();
        let mut b = MuffleAccumulator::default();
        for i in 0..10 {
            let visible = i % 3 == 0;
            let distance = i as f32;
            whole.add_sample(visible, distance);
            if i < 5 {
                a.add_sample(visible, distance);
            } else {
                b.add_sample(visible, distance);
            }
        }
        a.merge(&b);
        assert_eq!(a, whole);
    }

    #[test]
    fn test_reset_clears_slot() {
        let mut slot = BatchAccumulators::new(2);
        slot.targets[1].muffle.add_sample(true, 1.0);
        slot.targets[0].permeation.add_sample(0.5);
        slot.echo.add_sample(true, 2.0);

        slot.reset();
        assert_eq!(slot, BatchAccumulators::new(2));
    }
}
