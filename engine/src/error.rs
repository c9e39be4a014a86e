//! Error types for the propagation engine

use crate::io::SceneError;
use crate::target::AudioTargetId;

/// Errors that can occur while configuring or driving the engine
#[derive(Debug, thiserror::Error)]
pub enum AcousticsError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid collider: {0}")]
    InvalidCollider(String),

    #[error("Unknown audio target: {0}")]
    UnknownTarget(AudioTargetId),

    #[error("A trace cycle is still in flight")]
    TraceInFlight,

    #[error("Trace cycle worker disconnected before returning its results")]
    CycleDisconnected,

    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),
}

pub type Result<T> = std::result::Result<T, AcousticsError>;
