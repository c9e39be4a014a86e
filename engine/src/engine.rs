//! Control loop tying geometry, tracing, aggregation and feedback together
//!
//! At most one cycle is in flight at a time. A scheduled cycle runs on the
//! rayon pool with its own snapshot of the scene, target positions and
//! configuration; its results come back over a channel together with the
//! reusable buffers it borrowed.

use crate::aggregation::aggregate;
use crate::config::{CycleMode, FeedbackConfig, RayTraceConfig};
use crate::error::{AcousticsError, Result};
use crate::feedback::{AudioParameters, AudioTargetFeedback};
use crate::geometry::{ColliderGroup, SceneGeometry};
use crate::listener::Listener;
use crate::profile_zone;
use crate::target::{AudioTarget, AudioTargetId, AudioTargetSettings, TargetSnapshot};
use crate::tracer::{trace_cycle, CycleBuffers, CycleStats, EchoEstimate};
use crossbeam_channel::{Receiver, TryRecvError};
use glam::Vec3;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of [`PropagationEngine::update`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStatus {
    /// A new cycle was started this update
    Scheduled,
    /// The previous cycle is still running; nothing new was started
    Skipped,
}

/// Everything one cycle produced
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CycleResult {
    /// One record per target, indexed by [`AudioTargetId::index`]
    pub settings: Vec<AudioTargetSettings>,
    pub echo: EchoEstimate,
    pub stats: CycleStats,
}

struct CycleOutput {
    result: CycleResult,
    buffers: CycleBuffers,
}

/// Trace and aggregate one cycle on the calling thread (data-parallel inside)
fn execute_cycle(
    geometry: &SceneGeometry,
    listener: Vec3,
    targets: &[TargetSnapshot],
    config: &RayTraceConfig,
    buffers: &mut CycleBuffers,
) -> CycleResult {
    profile_zone!("execute_cycle");

    let stats = trace_cycle(geometry, listener, targets, config, buffers);
    let aggregated = aggregate(buffers.arena(), listener, targets, config);

    CycleResult {
        settings: aggregated.settings,
        echo: aggregated.echo,
        stats,
    }
}

/// Acoustic propagation engine
pub struct PropagationEngine {
    config: RayTraceConfig,
    feedback_config: FeedbackConfig,
    environment: Vec<ColliderGroup>,
    targets: Vec<AudioTarget>,
    geometry: Arc<SceneGeometry>,
    geometry_dirty: bool,
    /// `None` while the buffers are lent to an in-flight cycle
    buffers: Option<CycleBuffers>,
    in_flight: Option<Receiver<CycleOutput>>,
    echo: EchoEstimate,
    last_stats: Option<CycleStats>,
}

impl Default for PropagationEngine {
    fn default() -> Self {
        Self {
            config: RayTraceConfig::default(),
            feedback_config: FeedbackConfig::default(),
            environment: Vec::new(),
            targets: Vec::new(),
            geometry: Arc::new(SceneGeometry::new()),
            geometry_dirty: false,
            buffers: Some(CycleBuffers::new()),
            in_flight: None,
            echo: EchoEstimate::default(),
            last_stats: None,
        }
    }
}

impl PropagationEngine {
    pub fn new(config: RayTraceConfig, feedback_config: FeedbackConfig) -> Result<Self> {
        config.validate()?;
        feedback_config.validate()?;
        Ok(Self {
            config,
            feedback_config,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &RayTraceConfig {
        &self.config
    }

    /// Replace the trace configuration; buffers follow on the next cycle
    pub fn set_config(&mut self, config: RayTraceConfig) -> Result<()> {
        config.validate()?;
        if self.in_flight.is_some() {
            debug!("Config changed while a cycle is in flight, applies from the next cycle");
        }
        self.config = config;
        Ok(())
    }

    pub fn feedback_config(&self) -> &FeedbackConfig {
        &self.feedback_config
    }

    pub fn set_feedback_config(&mut self, config: FeedbackConfig) -> Result<()> {
        config.validate()?;
        self.feedback_config = config;
        Ok(())
    }

    /// Whether a cycle is currently running
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.in_flight.is_some() {
            return Err(AcousticsError::TraceInFlight);
        }
        Ok(())
    }

    /// Register static environment geometry
    pub fn add_environment(&mut self, group: ColliderGroup) -> Result<()> {
        self.ensure_idle()?;
        for collider in &group.colliders {
            collider.validate()?;
        }
        debug!(name = %group.name, colliders = group.len(), "Added environment group");
        self.environment.push(group);
        self.geometry_dirty = true;
        Ok(())
    }

    /// Register a sound source and the geometry it owns
    pub fn add_target(
        &mut self,
        name: impl Into<String>,
        position: Vec3,
        base_volume: f32,
        colliders: ColliderGroup,
    ) -> Result<AudioTargetId> {
        self.ensure_idle()?;
        for collider in &colliders.colliders {
            collider.validate()?;
        }
        if !(base_volume.is_finite() && base_volume >= 0.0) {
            return Err(AcousticsError::Configuration(format!(
                "base volume {base_volume} must be finite and >= 0"
            )));
        }

        let id = AudioTargetId(self.targets.len() as u32);
        let name = name.into();
        info!(%id, name = %name, colliders = colliders.len(), "Registered audio target");

        self.targets.push(AudioTarget {
            id,
            name,
            position,
            colliders,
            settings: None,
            feedback: AudioTargetFeedback::new(base_volume, &self.feedback_config),
        });
        self.geometry_dirty = true;
        Ok(id)
    }

    /// Remove every environment group; targets and their geometry stay
    pub fn clear_geometry(&mut self) -> Result<()> {
        self.ensure_idle()?;
        self.environment.clear();
        self.geometry_dirty = true;
        Ok(())
    }

    /// Move a target; the new position is picked up by the next scheduled cycle
    pub fn set_target_position(&mut self, id: AudioTargetId, position: Vec3) -> Result<()> {
        let target = self
            .targets
            .get_mut(id.index())
            .ok_or(AcousticsError::UnknownTarget(id))?;
        target.position = position;
        Ok(())
    }

    pub fn target(&self, id: AudioTargetId) -> Option<&AudioTarget> {
        self.targets.get(id.index())
    }

    pub fn targets(&self) -> &[AudioTarget] {
        &self.targets
    }

    /// Smoothed parameters the mixer should use for a target right now
    pub fn parameters(&self, id: AudioTargetId) -> Option<AudioParameters> {
        self.target(id).map(|target| target.feedback.current())
    }

    pub fn echo(&self) -> EchoEstimate {
        self.echo
    }

    pub fn last_stats(&self) -> Option<CycleStats> {
        self.last_stats
    }

    /// Flattened scene as used by the last scheduled cycle
    pub fn geometry(&self) -> &SceneGeometry {
        &self.geometry
    }

    /// Buffers of the last finished cycle, `None` while one is in flight
    pub fn buffers(&self) -> Option<&CycleBuffers> {
        self.buffers.as_ref()
    }

    /// Advance the engine by one application frame
    ///
    /// Collects a finished cycle and feeds its settings to the targets,
    /// starts the next cycle unless one is still running, then advances
    /// feedback smoothing by `dt` seconds.
    pub fn update(&mut self, listener: &Listener, dt: f32) -> Result<CycleStatus> {
        let status = match self.config.cycle_mode {
            CycleMode::SkipWhenBusy => {
                self.poll(listener)?;
                if self.in_flight.is_some() {
                    CycleStatus::Skipped
                } else {
                    self.schedule(listener)?;
                    CycleStatus::Scheduled
                }
            }
            CycleMode::Blocking => {
                self.wait(listener)?;
                self.schedule(listener)?;
                self.wait(listener)?;
                CycleStatus::Scheduled
            }
        };

        for target in &mut self.targets {
            target.feedback.tick(dt, &self.feedback_config);
        }
        Ok(status)
    }

    /// Trace and aggregate one cycle synchronously and feed the results
    pub fn run_cycle(&mut self, listener: &Listener) -> Result<CycleResult> {
        self.ensure_idle()?;
        self.refresh_geometry()?;

        let targets: Vec<TargetSnapshot> = self.targets.iter().map(AudioTarget::snapshot).collect();
        let mut buffers = self.buffers.take().unwrap_or_default();
        let result = execute_cycle(
            &self.geometry,
            listener.position,
            &targets,
            &self.config,
            &mut buffers,
        );

        self.finish(
            CycleOutput {
                result: result.clone(),
                buffers,
            },
            listener,
        );
        Ok(result)
    }

    /// Block until the in-flight cycle (if any) finishes and feed its results
    pub fn wait(&mut self, listener: &Listener) -> Result<()> {
        let Some(receiver) = self.in_flight.take() else {
            return Ok(());
        };
        let output = receiver.recv().map_err(|_| {
            warn!("Trace cycle worker dropped its channel");
            AcousticsError::CycleDisconnected
        })?;
        self.finish(output, listener);
        Ok(())
    }

    fn poll(&mut self, listener: &Listener) -> Result<()> {
        let received = match &self.in_flight {
            Some(receiver) => receiver.try_recv(),
            None => return Ok(()),
        };
        match received {
            Ok(output) => {
                self.in_flight = None;
                self.finish(output, listener);
                Ok(())
            }
            Err(TryRecvError::Empty) => Ok(()),
            Err(TryRecvError::Disconnected) => {
                self.in_flight = None;
                warn!("Trace cycle worker dropped its channel");
                Err(AcousticsError::CycleDisconnected)
            }
        }
    }

    fn schedule(&mut self, listener: &Listener) -> Result<()> {
        self.refresh_geometry()?;

        let geometry = Arc::clone(&self.geometry);
        let targets: Vec<TargetSnapshot> = self.targets.iter().map(AudioTarget::snapshot).collect();
        let config = self.config.clone();
        let mut buffers = self.buffers.take().unwrap_or_default();
        let origin = listener.position;

        let (sender, receiver) = crossbeam_channel::bounded(1);
        rayon::spawn(move || {
            let result = execute_cycle(&geometry, origin, &targets, &config, &mut buffers);
            // The engine may have been dropped meanwhile
            let _ = sender.send(CycleOutput { result, buffers });
        });

        self.in_flight = Some(receiver);
        Ok(())
    }

    fn finish(&mut self, output: CycleOutput, listener: &Listener) {
        let CycleOutput { result, buffers } = output;
        self.buffers = Some(buffers);

        for (target, settings) in self.targets.iter_mut().zip(&result.settings) {
            target.settings = Some(*settings);
            target
                .feedback
                .apply(settings, listener, target.position, &self.feedback_config);
        }

        self.echo = result.echo;
        self.last_stats = Some(result.stats);
        debug!(
            targets = result.settings.len(),
            rays = result.stats.rays,
            echo_strength = result.echo.strength,
            "Applied cycle results"
        );
    }

    fn refresh_geometry(&mut self) -> Result<()> {
        if !self.geometry_dirty {
            return Ok(());
        }
        let geometry = SceneGeometry::build(
            &self.environment,
            self.targets.iter().map(|target| (target.id, &target.colliders)),
        )?;
        info!(
            colliders = geometry.len(),
            environment_groups = self.environment.len(),
            targets = self.targets.len(),
            "Rebuilt scene geometry"
        );
        self.geometry = Arc::new(geometry);
        self.geometry_dirty = false;
        if let Some(buffers) = &mut self.buffers {
            buffers.discard_results();
        }
        Ok(())
    }
}
