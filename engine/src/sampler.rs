//! Deterministic ray directions on the unit sphere

use glam::Vec3;
use rayon::prelude::*;
use std::f32::consts::PI;
use tracing::debug;

/// Evenly distributed unit vectors using the Fibonacci-sphere construction
///
/// Index-addressable and free of RNG state: the same `count` always yields
/// the same table.
pub fn fibonacci_sphere(count: usize) -> Vec<Vec3> {
    let golden_angle = PI * (3.0 - 5.0_f32.sqrt());
    let denominator = count.saturating_sub(1).max(1) as f32;

    (0..count)
        .into_par_iter()
        .map(|i| {
            let y = 1.0 - 2.0 * i as f32 / denominator;
            let radius = (1.0 - y * y).max(0.0).sqrt();
            let theta = i as f32 * golden_angle;
            Vec3::new(theta.cos() * radius, y, theta.sin() * radius).normalize()
        })
        .collect()
}

/// Fibonacci directions regrouped into `stride` interleaved subsets
///
/// Entry order is index `0, stride, 2 * stride, ..` then `1, 1 + stride, ..`
/// and so on. Fibonacci order runs from pole to pole, so a contiguous run of
/// the plain table is one latitude band; a contiguous run of this table spans
/// every latitude.
pub fn interleaved_sphere(count: usize, stride: usize) -> Vec<Vec3> {
    let directions = fibonacci_sphere(count);
    let stride = stride.max(1);
    (0..stride)
        .flat_map(|offset| (offset..count).step_by(stride))
        .map(|index| directions[index])
        .collect()
}

/// Cached direction table, regenerated only when the ray count or batch layout changes
#[derive(Debug, Clone, Default)]
pub struct DirectionTable {
    directions: Vec<Vec3>,
    stride: usize,
}

impl DirectionTable {
    pub fn new(count: usize, stride: usize) -> Self {
        Self {
            directions: interleaved_sphere(count, stride),
            stride,
        }
    }

    /// Make sure the table holds `count` directions interleaved by `stride`
    ///
    /// Returns true if it was regenerated.
    pub fn ensure(&mut self, count: usize, stride: usize) -> bool {
        if self.directions.len() == count && self.stride == stride {
            return false;
        }
        debug!(
            from = self.directions.len(),
            to = count,
            stride,
            "Regenerating ray directions"
        );
        self.directions = interleaved_sphere(count, stride);
        self.stride = stride;
        true
    }

    pub fn directions(&self) -> &[Vec3] {
        &self.directions
    }

    pub fn len(&self) -> usize {
        self.directions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directions.is_empty()
    }
}
