//! Acoustic propagation engine for real-time spatial audio
//!
//! This crate traces stochastic sound rays from a listener through a scene made of
//! boxes and spheres, and turns the results into per-source audio parameters:
//! - Fibonacci-sphere ray directions
//! - Ray vs. AABB / OBB / sphere intersection
//! - Batched, data-parallel bounce tracing with per-batch accumulators
//! - Aggregation into muffle strength and apparent source position
//! - Smoothed volume, low-pass cutoff and pan for the downstream mixer

pub mod aggregation;
pub mod config;
pub mod engine;
pub mod error;
pub mod feedback;
pub mod geometry;
pub mod io;
pub mod listener;
pub mod profiling;
pub mod sampler;
pub mod target;
pub mod tracer;

// Re-export commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{CycleMode, FeedbackConfig, RayTraceConfig};

    // Errors
    pub use crate::error::{AcousticsError, Result};

    // Geometry
    pub use crate::geometry::{Collider, ColliderGroup, ColliderShape, SceneGeometry, Surface};

    // Targets and output
    pub use crate::feedback::{AudioParameters, AudioTargetFeedback};
    pub use crate::listener::Listener;
    pub use crate::target::{AudioTargetId, AudioTargetSettings};

    // Engine
    pub use crate::engine::{CycleStatus, PropagationEngine};
    pub use crate::tracer::EchoEstimate;

    // Scene files
    pub use crate::io::{AcousticScene, SceneError};

    // Math types
    pub use glam::{Quat, Vec3};
}

/// Initialize logging for the engine
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
