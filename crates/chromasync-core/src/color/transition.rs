//! Smoothed OKLab color transitions

use serde::{Deserialize, Serialize};

use super::oklab::OklabColor;
use crate::smoothing::SmootherState;

/// Default half-life for palette fades, in seconds
pub const DEFAULT_TRANSITION_HALF_LIFE: f32 = 0.4;

/// Fades a published color toward its latest target in OKLab space.
///
/// Interpolating in OKLab keeps the perceived lightness steady through the fade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorTransition {
    l: SmootherState,
    a: SmootherState,
    b: SmootherState,
    half_life: f32,
    initialized: bool,
}

impl ColorTransition {
    /// Create a transition with the given half-life in seconds
    pub fn new(half_life: f32) -> Self {
        Self {
            l: SmootherState::default(),
            a: SmootherState::default(),
            b: SmootherState::default(),
            half_life,
            initialized: false,
        }
    }

    /// Set the color to fade toward. The very first target is adopted immediately.
    pub fn set_target(&mut self, color: OklabColor) {
        if !color.is_finite() {
            return;
        }
        if !self.initialized {
            self.l.snap(color.l);
            self.a.snap(color.a);
            self.b.snap(color.b);
            self.initialized = true;
            return;
        }
        self.l.set_target(color.l);
        self.a.set_target(color.a);
        self.b.set_target(color.b);
    }

    /// Jump straight to `color`
    pub fn snap(&mut self, color: OklabColor) {
        self.l.snap(color.l);
        self.a.snap(color.a);
        self.b.snap(color.b);
        self.initialized = true;
    }

    /// Advance all components to `now_ms`
    pub fn advance_to(&mut self, now_ms: f64) -> OklabColor {
        OklabColor {
            l: self.l.advance_to(now_ms, self.half_life),
            a: self.a.advance_to(now_ms, self.half_life),
            b: self.b.advance_to(now_ms, self.half_life),
        }
    }

    /// Current (smoothed) color
    pub fn current(&self) -> OklabColor {
        OklabColor::new(self.l.current, self.a.current, self.b.current)
    }

    /// Color being approached
    pub fn target(&self) -> OklabColor {
        OklabColor::new(self.l.target, self.a.target, self.b.target)
    }

    /// Whether any target has been set yet
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Change the half-life for subsequent advances
    pub fn set_half_life(&mut self, half_life: f32) {
        self.half_life = half_life;
    }
}

impl Default for ColorTransition {
    fn default() -> Self {
        Self::new(DEFAULT_TRANSITION_HALF_LIFE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_target_snaps() {
        let mut transition = ColorTransition::default();
        assert!(!transition.is_initialized());
        let color = OklabColor::new(0.6, 0.1, -0.05);
        transition.set_target(color);
        assert_eq!(transition.current(), color);
    }

    #[test]
    fn test_fades_toward_new_target() {
        let mut transition = ColorTransition::new(0.1);
        transition.set_target(OklabColor::new(0.2, 0.0, 0.0));
        transition.advance_to(0.0);

        transition.set_target(OklabColor::new(0.8, 0.0, 0.0));
        let halfway = transition.advance_to(100.0);
        assert!((halfway.l - 0.5).abs() < 1e-4, "got {}", halfway.l);

        let settled = transition.advance_to(2000.0);
        assert!((settled.l - 0.8).abs() < 1e-3);
    }

    #[test]
    fn test_zero_half_life_snaps() {
        let mut transition = ColorTransition::new(0.0);
        transition.set_target(OklabColor::new(0.2, 0.0, 0.0));
        transition.advance_to(0.0);
        transition.set_target(OklabColor::new(0.9, 0.1, 0.1));
        assert_eq!(transition.advance_to(16.0), OklabColor::new(0.9, 0.1, 0.1));
    }

    #[test]
    fn test_non_finite_target_ignored() {
        let mut transition = ColorTransition::default();
        transition.set_target(OklabColor::new(0.5, 0.0, 0.0));
        transition.set_target(OklabColor::new(f32::NAN, 0.0, 0.0));
        assert_eq!(transition.target().l, 0.5);
    }
}
