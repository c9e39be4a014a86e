//! Configuration types for the propagation engine

use crate::error::{AcousticsError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How the control loop treats a cycle that has not finished yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CycleMode {
    /// Skip scheduling for this update and try again on the next one
    #[default]
    SkipWhenBusy,
    /// Block the caller until the running cycle completes
    Blocking,
}

/// Tunable parameters of the ray tracer and the aggregation stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RayTraceConfig {
    /// Number of directions in the Fibonacci table
    pub ray_count: usize,
    /// Reflections a ray may perform after its first hit
    pub max_bounces: usize,
    /// Distance budget of a single ray
    pub max_ray_distance: f32,
    /// Rays per batch
    pub batch_size: usize,
    /// Upper bound of batches traced per cycle; the rest is deferred
    pub max_batches_per_cycle: usize,
    /// Average path length at or below which a target sounds fully clear
    pub full_clarity_distance: f32,
    /// Fraction of visible bounce points at or above which a target sounds fully clear
    pub full_clarity_hit_percentage: f32,
    /// Strength lost per unit of path inside solid geometry
    pub permeation_falloff_per_unit: f32,
    /// Strength lost per unit of straight-line distance
    pub distance_falloff_per_unit: f32,
    /// Average permeation strength per ray that yields the full muffle reduction
    pub full_muffle_reduction_strength: f32,
    /// Largest muffle reduction permeation may contribute
    pub muffle_reduction_percent: f32,
    /// Backpressure policy of the control loop
    pub cycle_mode: CycleMode,
    /// Keep per-ray hit records for visualization
    pub record_ray_results: bool,
}

impl Default for RayTraceConfig {
    fn default() -> Self {
        Self {
            ray_count: 1000,
            max_bounces: 3,
            max_ray_distance: 10.0,
            batch_size: 256,
            max_batches_per_cycle: 8,
            full_clarity_distance: 10.0,
            full_clarity_hit_percentage: 0.5,
            permeation_falloff_per_unit: 0.5,
            distance_falloff_per_unit: 0.02,
            full_muffle_reduction_strength: 1.0,
            muffle_reduction_percent: 0.5,
            cycle_mode: CycleMode::SkipWhenBusy,
            record_ray_results: false,
        }
    }
}

impl RayTraceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ray_count(mut self, count: usize) -> Self {
        self.ray_count = count;
        self
    }

    pub fn max_bounces(mut self, bounces: usize) -> Self {
        self.max_bounces = bounces;
        self
    }

    pub fn max_ray_distance(mut self, distance: f32) -> Self {
        self.max_ray_distance = distance;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn max_batches_per_cycle(mut self, max: usize) -> Self {
        self.max_batches_per_cycle = max;
        self
    }

    pub fn full_clarity(mut self, distance: f32, hit_percentage: f32) -> Self {
        self.full_clarity_distance = distance;
        self.full_clarity_hit_percentage = hit_percentage;
        self
    }

    pub fn falloff(mut self, permeation_per_unit: f32, distance_per_unit: f32) -> Self {
        self.permeation_falloff_per_unit = permeation_per_unit;
        self.distance_falloff_per_unit = distance_per_unit;
        self
    }

    pub fn muffle_reduction(mut self, full_strength: f32, percent: f32) -> Self {
        self.full_muffle_reduction_strength = full_strength;
        self.muffle_reduction_percent = percent;
        self
    }

    pub fn cycle_mode(mut self, mode: CycleMode) -> Self {
        self.cycle_mode = mode;
        self
    }

    pub fn record_ray_results(mut self, record: bool) -> Self {
        self.record_ray_results = record;
        self
    }

    /// Hit records kept per ray: the first hit plus one per bounce
    pub fn hits_per_ray(&self) -> usize {
        self.max_bounces + 1
    }

    /// Number of batches needed to cover every ray once
    pub fn batch_count(&self) -> usize {
        self.ray_count.div_ceil(self.batch_size.max(1))
    }

    /// Number of batches traced in a single cycle
    pub fn batches_per_cycle(&self) -> usize {
        self.batch_count().min(self.max_batches_per_cycle)
    }

    /// Reject values that would break the trace before any work is scheduled
    pub fn validate(&self) -> Result<()> {
        if self.ray_count == 0 {
            return Err(invalid("ray_count must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(invalid("batch_size must be at least 1"));
        }
        if self.max_batches_per_cycle == 0 {
            return Err(invalid("max_batches_per_cycle must be at least 1"));
        }
        require_positive("max_ray_distance", self.max_ray_distance)?;
        require_positive("full_clarity_distance", self.full_clarity_distance)?;
        require_positive(
            "full_muffle_reduction_strength",
            self.full_muffle_reduction_strength,
        )?;
        if !(self.full_clarity_hit_percentage > 0.0 && self.full_clarity_hit_percentage <= 1.0) {
            return Err(invalid("full_clarity_hit_percentage must be in (0, 1]"));
        }
        require_non_negative("permeation_falloff_per_unit", self.permeation_falloff_per_unit)?;
        require_non_negative("distance_falloff_per_unit", self.distance_falloff_per_unit)?;
        if !(0.0..=1.0).contains(&self.muffle_reduction_percent) {
            return Err(invalid("muffle_reduction_percent must be in [0, 1]"));
        }

        debug!(
            ray_count = self.ray_count,
            max_bounces = self.max_bounces,
            batch_size = self.batch_size,
            batches_per_cycle = self.batches_per_cycle(),
            "Validated ray trace config"
        );
        Ok(())
    }
}

/// Rates and ranges used when turning settings into audible parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    /// Low-pass cutoff of a fully clear source
    pub max_cutoff_hz: f32,
    /// Low-pass cutoff of a fully muffled source
    pub min_cutoff_hz: f32,
    /// Fraction of the base volume kept when fully muffled
    pub occluded_volume_floor: f32,
    /// Maximum volume change per second
    pub volume_rate: f32,
    /// Minimum cutoff change per second
    pub cutoff_rate: f32,
    /// Maximum pan change per second
    pub pan_rate: f32,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            max_cutoff_hz: 22000.0,
            min_cutoff_hz: 250.0,
            occluded_volume_floor: 0.2,
            volume_rate: 0.5,
            cutoff_rate: 8500.0,
            pan_rate: 2.0,
        }
    }
}

impl FeedbackConfig {
    pub fn validate(&self) -> Result<()> {
        require_positive("min_cutoff_hz", self.min_cutoff_hz)?;
        if !(self.max_cutoff_hz.is_finite() && self.max_cutoff_hz >= self.min_cutoff_hz) {
            return Err(invalid("max_cutoff_hz must be finite and >= min_cutoff_hz"));
        }
        if !(0.0..=1.0).contains(&self.occluded_volume_floor) {
            return Err(invalid("occluded_volume_floor must be in [0, 1]"));
        }
        require_positive("volume_rate", self.volume_rate)?;
        require_positive("cutoff_rate", self.cutoff_rate)?;
        require_positive("pan_rate", self.pan_rate)?;
        Ok(())
    }
}

fn invalid(message: &str) -> AcousticsError {
    AcousticsError::Configuration(message.to_string())
}

fn require_positive(name: &str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(AcousticsError::Configuration(format!(
            "{name} must be positive and finite, got {value}"
        )))
    }
}

fn require_non_negative(name: &str, value: f32) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(AcousticsError::Configuration(format!(
            "{name} must be non-negative and finite, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(RayTraceConfig::default().validate().is_ok());
        assert!(FeedbackConfig::default().validate().is_ok());
    }

    #[test]
    fn test_batch_counts() {
        let config = RayTraceConfig::new()
            .ray_count(1000)
            .batch_size(256)
            .max_batches_per_cycle(8);
        assert_eq!(config.batch_count(), 4);
        assert_eq!(config.batches_per_cycle(), 4);

        let capped = config.max_batches_per_cycle(2);
        assert_eq!(capped.batch_count(), 4);
        assert_eq!(capped.batches_per_cycle(), 2);
    }

    #[test]
    fn test_rejects_zero_sizes() {
        assert!(RayTraceConfig::new().ray_count(0).validate().is_err());
        assert!(RayTraceConfig::new().batch_size(0).validate().is_err());
        assert!(RayTraceConfig::new()
            .max_batches_per_cycle(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_rejects_out_of_range_thresholds() {
        assert!(RayTraceConfig::new().full_clarity(0.0, 0.5).validate().is_err());
        assert!(RayTraceConfig::new().full_clarity(5.0, 1.5).validate().is_err());
        assert!(RayTraceConfig::new().falloff(-0.1, 0.0).validate().is_err());
        assert!(RayTraceConfig::new()
            .muffle_reduction(1.0, 1.2)
            .validate()
            .is_err());
        assert!(RayTraceConfig::new()
            .max_ray_distance(f32::NAN)
            .validate()
            .is_err());
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: RayTraceConfig =
            serde_json::from_str(r#"{ "ray_count": 64, "cycle_mode": "Blocking" }"#).unwrap();
        assert_eq!(config.ray_count, 64);
        assert_eq!(config.cycle_mode, CycleMode::Blocking);
        assert_eq!(config.max_bounces, 3);
    }

    #[test]
    fn test_feedback_config_rejects_inverted_cutoffs() {
        let config = FeedbackConfig {
            max_cutoff_hz: 100.0,
            min_cutoff_hz: 250.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
