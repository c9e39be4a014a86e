//! JSON scene descriptions for tools and tests

use crate::config::{FeedbackConfig, RayTraceConfig};
use crate::engine::PropagationEngine;
use crate::error::Result;
use crate::geometry::{Collider, ColliderGroup};
use crate::listener::Listener;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use tracing::info;

/// Errors that can occur during scene operations
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid scene: {0}")]
    Invalid(String),
}

/// A sound source as written in a scene file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TargetDescription {
    pub name: String,
    pub position: Vec3,
    #[serde(default = "default_volume")]
    pub base_volume: f32,
    #[serde(default)]
    pub colliders: Vec<Collider>,
}

fn default_volume() -> f32 {
    1.0
}

/// Complete acoustic scene: configuration, listener pose and geometry
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AcousticScene {
    pub config: RayTraceConfig,
    pub feedback: FeedbackConfig,
    pub listener: Listener,
    pub environment: Vec<ColliderGroup>,
    pub targets: Vec<TargetDescription>,
}

impl AcousticScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a scene from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> std::result::Result<Self, SceneError> {
        let path = path.as_ref();
        info!(path = ?path, "Loading acoustic scene");

        let json = fs::read_to_string(path)?;
        let scene: Self = serde_json::from_str(&json)?;
        scene.check()?;

        info!(
            path = ?path,
            environment_groups = scene.environment.len(),
            targets = scene.targets.len(),
            "Acoustic scene loaded"
        );
        Ok(scene)
    }

    /// Save the scene to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> std::result::Result<(), SceneError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!(path = ?path, "Acoustic scene saved");
        Ok(())
    }

    fn check(&self) -> std::result::Result<(), SceneError> {
        for (index, target) in self.targets.iter().enumerate() {
            if target.name.trim().is_empty() {
                return Err(SceneError::Invalid(format!("target {index} has no name")));
            }
            if !target.position.is_finite() {
                return Err(SceneError::Invalid(format!(
                    "target '{}' has a non-finite position",
                    target.name
                )));
            }
        }
        Ok(())
    }

    /// Build a ready-to-run engine from this scene
    pub fn into_engine(self) -> Result<PropagationEngine> {
        self.check()?;
        let mut engine = PropagationEngine::new(self.config, self.feedback)?;
        for group in self.environment {
            engine.add_environment(group)?;
        }
        for target in self.targets {
            let colliders = ColliderGroup {
                name: target.name.clone(),
                colliders: target.colliders,
            };
            engine.add_target(target.name, target.position, target.base_volume, colliders)?;
        }
        Ok(engine)
    }
}
