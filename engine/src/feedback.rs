//! Conversion of cycle settings into smoothed, audible parameters
//!
//! A settings record arrives once per cycle; the mixer reads the current
//! parameters every frame, which move toward their targets at a bounded rate
//! to avoid audible popping.

use crate::config::FeedbackConfig;
use crate::listener::Listener;
use crate::target::AudioTargetSettings;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Parameters consumed by the downstream mixer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioParameters {
    pub volume: f32,
    pub low_pass_cutoff_hz: f32,
    /// -1.0 = full left, 0.0 = center, 1.0 = full right
    pub pan: f32,
}

impl AudioParameters {
    /// A fully clear source at the given volume
    pub fn clear(volume: f32, config: &FeedbackConfig) -> Self {
        Self {
            volume,
            low_pass_cutoff_hz: config.max_cutoff_hz,
            pan: 0.0,
        }
    }

    /// Parameters a settings record asks for
    ///
    /// When the record has no direction estimate the pan follows the
    /// target's true position.
    pub fn from_settings(
        settings: &AudioTargetSettings,
        base_volume: f32,
        listener: &Listener,
        target_position: Vec3,
        config: &FeedbackConfig,
    ) -> Self {
        let muffle = settings.muffle_strength.clamp(0.0, 1.0);
        let clarity = 1.0 - muffle;
        let relative = settings
            .estimated_position
            .unwrap_or(target_position - listener.position);

        Self {
            volume: base_volume * lerp(config.occluded_volume_floor, 1.0, clarity),
            low_pass_cutoff_hz: lerp(config.max_cutoff_hz, config.min_cutoff_hz, muffle),
            pan: listener.pan_towards(relative),
        }
    }
}

/// Smoothing state of one audio target
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTargetFeedback {
    base_volume: f32,
    current: AudioParameters,
    target: AudioParameters,
}

impl AudioTargetFeedback {
    pub fn new(base_volume: f32, config: &FeedbackConfig) -> Self {
        let clear = AudioParameters::clear(base_volume, config);
        Self {
            base_volume,
            current: clear,
            target: clear,
        }
    }

    pub fn base_volume(&self) -> f32 {
        self.base_volume
    }

    /// Parameters the mixer should use right now
    pub fn current(&self) -> AudioParameters {
        self.current
    }

    /// Parameters the smoothing is heading toward
    pub fn target(&self) -> AudioParameters {
        self.target
    }

    /// Accept a new settings record; takes effect gradually through [`tick`](Self::tick)
    pub fn apply(
        &mut self,
        settings: &AudioTargetSettings,
        listener: &Listener,
        target_position: Vec3,
        config: &FeedbackConfig,
    ) {
        self.target = AudioParameters::from_settings(
            settings,
            self.base_volume,
            listener,
            target_position,
            config,
        );
    }

    /// Advance smoothing by `dt` seconds
    ///
    /// The cutoff opens at least as fast as the remaining gap per second so
    /// a source coming out of occlusion clears up quickly.
    pub fn tick(&mut self, dt: f32, config: &FeedbackConfig) {
        if !(dt.is_finite() && dt > 0.0) {
            return;
        }
        let current = &mut self.current;
        let target = &self.target;

        current.volume = move_towards(current.volume, target.volume, config.volume_rate * dt);

        let opening = target.low_pass_cutoff_hz - current.low_pass_cutoff_hz;
        let cutoff_rate = config.cutoff_rate.max(opening);
        current.low_pass_cutoff_hz = move_towards(
            current.low_pass_cutoff_hz,
            target.low_pass_cutoff_hz,
            cutoff_rate * dt,
        );

        current.pan = move_towards(current.pan, target.pan, config.pan_rate * dt);
    }

    /// Jump straight to the target parameters
    pub fn snap(&mut self) {
        self.current = self.target;
    }
}

/// Move `current` toward `target` by at most `max_delta`
pub fn move_towards(current: f32, target: f32, max_delta: f32) -> f32 {
    let delta = target - current;
    if delta.abs() <= max_delta {
        target
    } else {
        current + delta.signum() * max_delta
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Equal-power left/right gains for a pan value
pub fn stereo_gains(pan: f32) -> (f32, f32) {
    let pan = pan.clamp(-1.0, 1.0);
    let angle = ((pan + 1.0) / 2.0) * std::f32::consts::FRAC_PI_2;
    (angle.cos(), angle.sin())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(muffle: f32, position: Option<Vec3>) -> AudioTargetSettings {
        AudioTargetSettings {
            muffle_strength: muffle,
            estimated_position: position,
            hit_count: 1,
        }
    }

    #[test]
    fn test_clear_and_muffled_targets() {
        let config = FeedbackConfig::default();
        let listener = Listener::default();

        let clear = AudioParameters::from_settings(
            &settings(0.0, Some(Vec3::X)),
            0.8,
            &listener,
            Vec3::X,
            &config,
        );
        assert!((clear.volume - 0.8).abs() < 1e-6);
        assert!((clear.low_pass_cutoff_hz - 22000.0).abs() < 1e-3);

        let muffled = AudioParameters::from_settings(
            &settings(1.0, Some(Vec3::X)),
            0.8,
            &listener,
            Vec3::X,
            &config,
        );
        assert!((muffled.volume - 0.8 * 0.2).abs() < 1e-6);
        assert!((muffled.low_pass_cutoff_hz - 250.0).abs() < 1e-3);
    }

    #[test]
    fn test_pan_falls_back_to_true_position() {
        let config = FeedbackConfig::default();
        let listener = Listener::default();
        let params = AudioParameters::from_settings(
            &settings(1.0, None),
            1.0,
            &listener,
            Vec3::new(-4.0, 0.0, 0.0),
            &config,
        );
        assert!((params.pan + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_tick_is_rate_limited() {
        let config = FeedbackConfig::default();
        let listener = Listener::default();
        let mut feedback = AudioTargetFeedback::new(1.0, &config);

        feedback.apply(&settings(1.0, Some(Vec3::X)), &listener, Vec3::X, &config);
        feedback.tick(0.1, &config);
        let current = feedback.current();
        // 0.5 / s volume rate
        assert!((current.volume - 0.95).abs() < 1e-5);
        // 8500 Hz / s when closing
        assert!((current.low_pass_cutoff_hz - (22000.0 - 850.0)).abs() < 1e-2);
        // 2.0 / s pan rate
        assert!((current.pan - 0.2).abs() < 1e-5);

        for _ in 0..100 {
            feedback.tick(0.1, &config);
        }
        assert_eq!(feedback.current(), feedback.target());
    }

    #[test]
    fn test_cutoff_opens_at_least_by_gap_rate() {
        let config = FeedbackConfig::default();
        let listener = Listener::default();
        let mut feedback = AudioTargetFeedback::new(1.0, &config);

        feedback.apply(&settings(1.0, None), &listener, Vec3::X, &config);
        feedback.snap();
        feedback.apply(&settings(0.0, None), &listener, Vec3::X, &config);
        feedback.tick(0.5, &config);

        // Gap of 21750 Hz, half a second covers half of it
        let expected = 250.0 + 21750.0 * 0.5;
        assert!((feedback.current().low_pass_cutoff_hz - expected).abs() < 1e-1);
    }

    #[test]
    fn test_tick_ignores_invalid_time_steps() {
        let config = FeedbackConfig::default();
        let listener = Listener::default();
        let mut feedback = AudioTargetFeedback::new(1.0, &config);
        feedback.apply(&settings(1.0, Some(Vec3::X)), &listener, Vec3::X, &config);

        let before = feedback.current();
        for dt in [f32::NAN, f32::INFINITY, -0.1, 0.0] {
            feedback.tick(dt, &config);
            assert_eq!(feedback.current(), before);
        }

        feedback.tick(0.1, &config);
        let current = feedback.current();
        assert!(current.volume.is_finite() && current.volume < 1.0);
        assert!(current.low_pass_cutoff_hz.is_finite());
        assert!(current.pan.is_finite());
    }

    #[test]
    fn test_move_towards() {
        assert_eq!(move_towards(0.0, 1.0, 0.25), 0.25);
        assert_eq!(move_towards(1.0, 0.0, 0.25), 0.75);
        assert_eq!(move_towards(0.9, 1.0, 0.25), 1.0);
    }

    #[test]
    fn test_stereo_gains_equal_power() {
        let (left, right) = stereo_gains(0.0);
        assert!((left - right).abs() < 1e-6);
        assert!((left * left + right * right - 1.0).abs() < 1e-6);

        let (left, right) = stereo_gains(1.0);
        assert!(left.abs() < 1e-6);
        assert!((right - 1.0).abs() < 1e-6);
    }
}
