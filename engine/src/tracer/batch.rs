//! Batch scheduling and the reusable per-cycle buffers

use super::accumulator::BatchAccumulators;
use super::bounce::{trace_ray, TraceContext};
use crate::config::RayTraceConfig;
use crate::sampler::DirectionTable;
use crate::target::AudioTargetId;
use glam::Vec3;
use tracing::{debug, trace, warn};

/// One hit of a ray, kept for visualization
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RayRecord {
    pub distance: f32,
    /// `None` marks an unused slot
    pub collider: Option<usize>,
    pub audio_target: Option<AudioTargetId>,
    pub point: Vec3,
}

/// Rotating cursor over the batch range
///
/// When fewer batches run per cycle than exist, each cycle picks up where
/// the previous one stopped, so deferred rays are traced on later cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSchedule {
    cursor: usize,
}

impl BatchSchedule {
    /// Batch ids to trace this cycle, advancing the cursor
    pub fn next_batches(&mut self, batch_count: usize, per_cycle: usize) -> Vec<usize> {
        if batch_count == 0 {
            return Vec::new();
        }
        let per_cycle = per_cycle.min(batch_count);
        let start = self.cursor % batch_count;
        self.cursor = (start + per_cycle) % batch_count;
        (0..per_cycle).map(|i| (start + i) % batch_count).collect()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

/// Sizes every buffer was allocated for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BufferLayout {
    ray_count: usize,
    max_bounces: usize,
    batch_size: usize,
    target_count: usize,
    record_rays: bool,
}

impl BufferLayout {
    fn new(config: &RayTraceConfig, target_count: usize) -> Self {
        Self {
            ray_count: config.ray_count,
            max_bounces: config.max_bounces,
            batch_size: config.batch_size,
            target_count,
            record_rays: config.record_ray_results,
        }
    }

    fn same_rays(&self, other: &Self) -> bool {
        self.ray_count == other.ray_count
            && self.max_bounces == other.max_bounces
            && self.batch_size == other.batch_size
    }
}

/// Direction table, accumulator arena and debug records reused across cycles
///
/// The arena holds one slot per batch. A slot keeps the latest trace of its
/// batch until that batch is traced again, so with a per-cycle cap the arena
/// is a rolling window over the whole ray set.
///
/// Owned by at most one cycle at a time; moved into the worker while a
/// cycle is in flight.
#[derive(Debug, Clone, Default)]
pub struct CycleBuffers {
    directions: DirectionTable,
    arena: Vec<BatchAccumulators>,
    records: Vec<RayRecord>,
    bounce_counts: Vec<u32>,
    schedule: BatchSchedule,
    layout: Option<BufferLayout>,
}

impl CycleBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reallocate everything whose size no longer matches the configuration
    ///
    /// Returns true when buffers were rebuilt. Nothing sized for an older
    /// layout survives a rebuild.
    pub fn ensure(&mut self, config: &RayTraceConfig, target_count: usize) -> bool {
        let layout = BufferLayout::new(config, target_count);
        if self.layout == Some(layout) {
            return false;
        }

        match self.layout {
            Some(previous) if !previous.same_rays(&layout) => warn!(
                from_rays = previous.ray_count,
                to_rays = layout.ray_count,
                from_bounces = previous.max_bounces,
                to_bounces = layout.max_bounces,
                "Ray configuration changed, regenerating cycle buffers"
            ),
            _ => debug!(
                rays = layout.ray_count,
                targets = layout.target_count,
                batches = config.batch_count(),
                "Allocating cycle buffers"
            ),
        }

        self.directions.ensure(config.ray_count, config.batch_count());
        self.bounce_counts = vec![0; config.ray_count];
        self.records = if config.record_ray_results {
            vec![RayRecord::default(); config.ray_count * config.hits_per_ray()]
        } else {
            Vec::new()
        };
        self.arena = (0..config.batch_count())
            .map(|_| BatchAccumulators::new(target_count))
            .collect();
        self.schedule = BatchSchedule::default();
        self.layout = Some(layout);
        true
    }

    pub fn directions(&self) -> &[Vec3] {
        self.directions.directions()
    }

    /// Accumulator slots indexed by batch; never-traced slots are empty
    pub fn arena(&self) -> &[BatchAccumulators] {
        &self.arena
    }

    /// Empty every slot and restart the rotation
    ///
    /// Used when the scene changes so no batch reports hits against old geometry.
    pub fn discard_results(&mut self) {
        for slot in &mut self.arena {
            slot.reset();
        }
        self.bounce_counts.fill(0);
        self.records.fill(RayRecord::default());
        self.schedule = BatchSchedule::default();
    }

    /// Hits recorded for every ray, `hits_per_ray` slots each; empty unless recording
    pub fn records(&self) -> &[RayRecord] {
        &self.records
    }

    /// Hits of a single ray from the last cycle that traced it
    pub fn ray_records(&self, ray: usize) -> &[RayRecord] {
        let Some(layout) = self.layout else {
            return &[];
        };
        if self.records.is_empty() || ray >= layout.ray_count {
            return &[];
        }
        let stride = layout.max_bounces + 1;
        let hits = self.bounce_counts[ray] as usize;
        &self.records[ray * stride..ray * stride + hits.min(stride)]
    }

    /// Number of hits per ray from the last cycle that traced it
    pub fn bounce_counts(&self) -> &[u32] {
        &self.bounce_counts
    }

    /// Split the buffers into disjoint per-batch jobs for this cycle
    pub(crate) fn batch_jobs(&mut self, config: &RayTraceConfig) -> (&[Vec3], Vec<BatchJob<'_>>) {
        let batches = self
            .schedule
            .next_batches(config.batch_count(), config.batches_per_cycle());
        trace!(?batches, cursor = self.schedule.cursor(), "Scheduled batches");
        let batch_size = config.batch_size;
        let stride = config.hits_per_ray();

        let records = self
            .records
            .chunks_mut(batch_size * stride)
            .map(Some)
            .chain(std::iter::repeat_with(|| None));

        let mut all: Vec<Option<BatchJob<'_>>> = self
            .arena
            .iter_mut()
            .zip(self.bounce_counts.chunks_mut(batch_size))
            .zip(records)
            .enumerate()
            .map(|(batch, ((slot, bounce_counts), records))| {
                Some(BatchJob {
                    batch,
                    first_ray: batch * batch_size,
                    slot,
                    records,
                    bounce_counts,
                })
            })
            .collect();

        let jobs = batches
            .into_iter()
            .filter_map(|batch| all.get_mut(batch)?.take())
            .collect();

        (self.directions.directions(), jobs)
    }
}

/// Exclusive view of one batch's slice of the cycle buffers
pub(crate) struct BatchJob<'a> {
    pub batch: usize,
    pub first_ray: usize,
    pub slot: &'a mut BatchAccumulators,
    pub records: Option<&'a mut [RayRecord]>,
    pub bounce_counts: &'a mut [u32],
}

impl BatchJob<'_> {
    /// Trace every ray of the batch sequentially; returns the total hit count
    pub fn run(&mut self, ctx: &TraceContext<'_>, directions: &[Vec3]) -> u64 {
        self.slot.reset();
        if let Some(records) = self.records.as_deref_mut() {
            records.fill(RayRecord::default());
        }

        let stride = ctx.config.hits_per_ray();
        let mut total_hits = 0u64;
        for local in 0..self.bounce_counts.len() {
            let direction = directions[self.first_ray + local];
            let records = self
                .records
                .as_deref_mut()
                .map(|records| &mut records[local * stride..(local + 1) * stride]);
            let hits = trace_ray(ctx, direction, self.slot, records);
            self.bounce_counts[local] = hits;
            total_hits += u64::from(hits);
        }

        trace!(
            batch = self.batch,
            rays = self.bounce_counts.len(),
            hits = total_hits,
            "Batch traced"
        );
        total_hits
    }
}
