//! Scene file loading and saving

mod scene;

pub use scene::{AcousticScene, SceneError, TargetDescription};
