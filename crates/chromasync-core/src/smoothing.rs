//! Framerate-independent exponential smoothing
//!
//! Every continuous signal in the engine (beat pulse, color transitions,
//! blend-ratio modulation) is advanced through [`step`], so the value reached
//! after a given wall-clock time does not depend on how often the caller ticks.

use serde::{Deserialize, Serialize};

/// Half-lives at or below this are treated as "snap to target".
pub const MIN_HALF_LIFE: f32 = 1e-5;

/// Advance `current` toward `target` along an exponential decay curve.
///
/// `next = target + (current - target) * 2^(-delta_time / half_life)`
///
/// A half-life at or below [`MIN_HALF_LIFE`] or a non-positive `delta_time`
/// returns `target` exactly.
pub fn step(current: f32, target: f32, delta_time: f32, half_life: f32) -> f32 {
    if half_life <= MIN_HALF_LIFE || delta_time <= 0.0 || !delta_time.is_finite() {
        return target;
    }
    if !current.is_finite() {
        return target;
    }

    let decay = (-delta_time / half_life).exp2();
    target + (current - target) * decay
}

/// Per-signal smoother state.
///
/// Owned by exactly one driver; timestamps are in milliseconds on whatever
/// monotonic clock the driver uses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmootherState {
    /// Current smoothed value
    pub current: f32,
    /// Value being approached
    pub target: f32,
    /// Timestamp of the last advance (None before the first advance)
    pub last_update_ms: Option<f64>,
}

impl Default for SmootherState {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl SmootherState {
    /// Create a state resting at `value`
    pub fn new(value: f32) -> Self {
        Self {
            current: value,
            target: value,
            last_update_ms: None,
        }
    }

    /// Set a new target without advancing
    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    /// Jump both current and target to `value`
    pub fn snap(&mut self, value: f32) {
        self.current = value;
        self.target = value;
    }

    /// True when the target lies above the current value
    pub fn is_rising(&self) -> bool {
        self.target > self.current
    }

    /// Advance to `now_ms` using `half_life` seconds.
    ///
    /// The first call only records the timestamp. Clocks that run backwards
    /// are treated as zero elapsed time, which snaps to the target.
    pub fn advance_to(&mut self, now_ms: f64, half_life: f32) -> f32 {
        let dt = match self.last_update_ms {
            Some(last) => ((now_ms - last) / 1000.0) as f32,
            None => {
                self.last_update_ms = Some(now_ms);
                return self.current;
            }
        };
        self.last_update_ms = Some(now_ms);
        self.current = step(self.current, self.target, dt, half_life);
        self.current
    }

    /// Advance by an explicit delta in seconds
    pub fn advance_by(&mut self, delta_time: f32, half_life: f32) -> f32 {
        self.current = step(self.current, self.target, delta_time, half_life);
        if let Some(last) = self.last_update_ms.as_mut() {
            *last += f64::from(delta_time) * 1000.0;
        }
        self.current
    }
}
