//! Beat-pulse smoothing driver
//!
//! Converts discrete beat declarations into a continuous, jitter-free pulse
//! intensity plus a tempo-locked breathing scale. Beats are declared by an
//! edge detector on processed energy, gated by a minimum inter-beat interval
//! derived from the estimated tempo.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::f32::consts::TAU;
use tracing::trace;

use crate::music::ProcessedMusicState;
use crate::smoothing::SmootherState;

/// Pulse driver tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PulseConfig {
    /// Energy level whose upward crossing declares a beat
    pub energy_threshold: f32,
    /// Absolute floor for the inter-beat gate
    pub min_beat_interval_ms: f64,
    /// The gate is `60000 / (bpm * divisor)`
    pub bpm_interval_divisor: f32,
    /// Half-life while the pulse rises, seconds
    pub attack_half_life: f32,
    /// Half-life while the pulse falls, seconds
    pub decay_half_life: f32,
    /// Below this a decaying pulse snaps to zero
    pub reset_threshold: f32,
    /// The attack releases into decay once within this fraction of its peak
    pub peak_tolerance: f32,
    /// Breathing scale at rest
    pub breathing_base_scale: f32,
    /// Breathing amplitude at full energy
    pub breathing_max_amplitude: f32,
    /// Beats per breathing cycle
    pub beats_per_breath: f32,
    /// Tempo used when neither the track nor beat history provide one
    pub fallback_bpm: f32,
    /// Declared beats kept for tempo estimation
    pub beat_history: usize,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            energy_threshold: 0.65,
            min_beat_interval_ms: 150.0,
            bpm_interval_divisor: 1.5,
            attack_half_life: 0.025,
            decay_half_life: 0.075,
            reset_threshold: 0.005,
            peak_tolerance: 0.02,
            breathing_base_scale: 1.0,
            breathing_max_amplitude: 0.04,
            beats_per_breath: 4.0,
            fallback_bpm: 120.0,
            beat_history: 8,
        }
    }
}

impl PulseConfig {
    /// Minimum time between declared beats at `bpm`
    pub fn min_interval_ms(&self, bpm: f32) -> f64 {
        if !bpm.is_finite() || bpm <= 0.0 {
            return self.min_beat_interval_ms;
        }
        let tempo_gate = 60_000.0 / f64::from(bpm * self.bpm_interval_divisor);
        tempo_gate.max(self.min_beat_interval_ms)
    }
}

/// Logical pulse state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PulseState {
    /// No pulse in flight
    Idle,
    /// Attack or decay in progress
    Pulsing,
}

/// Signals published each frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PulseFrame {
    /// Smoothed pulse intensity, [0, 1]
    pub pulse_intensity: f32,
    /// `base + amplitude * sin(phase)`
    pub breathing_scale: f32,
    /// Breathing phase, [0, 2π)
    pub phase: f32,
    /// Logical state after this frame
    pub state: PulseState,
}

/// Beat-pulse driver. Owns its smoother state exclusively.
#[derive(Debug, Clone)]
pub struct BeatPulseDriver {
    config: PulseConfig,
    pulse: SmootherState,
    attacking: bool,
    last_beat_ms: Option<f64>,
    last_energy: f32,
    beat_times: VecDeque<f64>,
    track_bpm: Option<f32>,
    visual_intensity: f32,
    processed_energy: f32,
    speed_factor: f32,
    phase: f32,
    last_frame_ms: Option<f64>,
}

impl BeatPulseDriver {
    /// Create an idle driver
    pub fn new(config: PulseConfig) -> Self {
        Self {
            config,
            pulse: SmootherState::new(0.0),
            attacking: false,
            last_beat_ms: None,
            last_energy: 0.0,
            beat_times: VecDeque::with_capacity(config.beat_history.max(2)),
            track_bpm: None,
            visual_intensity: 0.0,
            processed_energy: 0.0,
            speed_factor: 1.0,
            phase: 0.0,
            last_frame_ms: None,
        }
    }

    /// Adopt a new processed music state
    pub fn set_music(&mut self, state: &ProcessedMusicState) {
        self.track_bpm = Some(state.tempo_bpm()).filter(|b| b.is_finite() && *b > 0.0);
        self.visual_intensity = state.visual_intensity.clamp(0.0, 1.0);
        self.processed_energy = state.processed_energy.clamp(0.0, 1.0);
        self.speed_factor = state.animation_speed_factor.max(0.0);
    }

    /// Drop music context, e.g. when playback stops
    pub fn clear_music(&mut self) {
        self.track_bpm = None;
        self.visual_intensity = 0.0;
        self.processed_energy = 0.0;
        self.speed_factor = 1.0;
    }

    /// Tempo used for gating: track tempo, else estimated from beats, else fallback
    pub fn estimated_bpm(&self) -> f32 {
        self.track_bpm
            .or_else(|| self.bpm_from_history())
            .unwrap_or(self.config.fallback_bpm)
    }

    fn bpm_from_history(&self) -> Option<f32> {
        if self.beat_times.len() < 3 {
            return None;
        }
        let mut intervals: Vec<f64> = self
            .beat_times
            .iter()
            .zip(self.beat_times.iter().skip(1))
            .map(|(a, b)| b - a)
            .filter(|d| *d > 0.0)
            .collect();
        if intervals.is_empty() {
            return None;
        }
        intervals.sort_by(|a, b| a.total_cmp(b));
        let median = intervals[intervals.len() / 2];
        Some((60_000.0 / median) as f32)
    }

    /// Feed the current energy level. Returns true when a beat is declared.
    pub fn observe_energy(&mut self, energy: f32, now_ms: f64) -> bool {
        let energy = if energy.is_finite() { energy } else { 0.0 };
        let crossed = self.last_energy < self.config.energy_threshold
            && energy >= self.config.energy_threshold;
        self.last_energy = energy;

        if !crossed {
            return false;
        }

        let gate = self.config.min_interval_ms(self.estimated_bpm());
        if let Some(last) = self.last_beat_ms {
            if now_ms - last <= gate {
                trace!(
                    "Beat suppressed: {:.0}ms since last, gate {:.0}ms",
                    now_ms - last,
                    gate
                );
                return false;
            }
        }

        self.declare_beat(now_ms);
        true
    }

    fn declare_beat(&mut self, now_ms: f64) {
        self.last_beat_ms = Some(now_ms);
        self.beat_times.push_back(now_ms);
        while self.beat_times.len() > self.config.beat_history.max(2) {
            self.beat_times.pop_front();
        }
        // A beat no louder than the pulse in flight goes straight to release
        self.attacking = self.visual_intensity > self.pulse.current;
        let target = if self.attacking {
            self.visual_intensity
        } else {
            0.0
        };
        self.pulse.set_target(target);
        trace!("Beat declared at {:.0}ms, target {:.3}", now_ms, target);
    }

    /// Advance one animation frame
    pub fn tick(&mut self, now_ms: f64) -> PulseFrame {
        let dt = self
            .last_frame_ms
            .map(|last| ((now_ms - last) / 1000.0).max(0.0) as f32)
            .unwrap_or(0.0);
        self.last_frame_ms = Some(now_ms);

        let half_life = if self.attacking {
            self.config.attack_half_life
        } else {
            self.config.decay_half_life
        };
        let current = self.pulse.advance_to(now_ms, half_life);

        if self.attacking {
            let peak = self.pulse.target;
            if current >= peak * (1.0 - self.config.peak_tolerance) {
                self.attacking = false;
                self.pulse.set_target(0.0);
            }
        } else if current < self.config.reset_threshold {
            self.pulse.snap(0.0);
        }

        self.advance_breathing(dt);

        PulseFrame {
            pulse_intensity: self.pulse.current.clamp(0.0, 1.0),
            breathing_scale: self.breathing_scale(),
            phase: self.phase,
            state: self.state(),
        }
    }

    fn advance_breathing(&mut self, dt: f32) {
        let beats_per_second = self.estimated_bpm() / 60.0;
        let breaths_per_second = beats_per_second / self.config.beats_per_breath.max(0.25);
        let step = dt * TAU * breaths_per_second * self.speed_factor;
        self.phase = (self.phase + step).rem_euclid(TAU);
    }

    /// Current breathing scale
    pub fn breathing_scale(&self) -> f32 {
        let amplitude = self.config.breathing_max_amplitude * self.processed_energy;
        self.config.breathing_base_scale + amplitude * self.phase.sin()
    }

    /// Idle when both current and target rest at zero
    pub fn state(&self) -> PulseState {
        if self.pulse.current <= 0.0 && self.pulse.target <= 0.0 {
            PulseState::Idle
        } else {
            PulseState::Pulsing
        }
    }

    /// Current smoothed intensity
    pub fn pulse_intensity(&self) -> f32 {
        self.pulse.current
    }

    /// Configuration in use
    pub fn config(&self) -> &PulseConfig {
        &self.config
    }
}

impl Default for BeatPulseDriver {
    fn default() -> Self {
        Self::new(PulseConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::music::{AudioFeatureSample, FeatureProcessor};

    fn music(tempo: f32) -> ProcessedMusicState {
        let sample = AudioFeatureSample {
            track_id: "t".to_string(),
            energy: 0.8,
            valence: 0.7,
            danceability: 0.75,
            tempo_bpm: tempo,
            duration_ms: 1000,
        };
        FeatureProcessor::default().process(&sample, 0)
    }

    fn quiet_music() -> ProcessedMusicState {
        let sample = AudioFeatureSample {
            track_id: "q".to_string(),
            energy: 0.2,
            valence: 0.3,
            danceability: 0.2,
            tempo_bpm: 120.0,
            duration_ms: 1000,
        };
        FeatureProcessor::default().process(&sample, 0)
    }

    #[test]
    fn test_min_interval() {
        let config = PulseConfig::default();
        assert!((config.min_interval_ms(120.0) - 333.333).abs() < 0.01);
        assert_eq!(config.min_interval_ms(400.0), 150.0);
        assert_eq!(config.min_interval_ms(0.0), 150.0);
    }

    #[test]
    fn test_beat_gating_scenario() {
        let mut driver = BeatPulseDriver::default();
        driver.set_music(&music(120.0));

        assert!(driver.observe_energy(0.8, 0.0));
        driver.observe_energy(0.3, 50.0);
        assert!(!driver.observe_energy(0.8, 100.0));
        driver.observe_energy(0.3, 200.0);
        assert!(driver.observe_energy(0.8, 400.0));
    }

    #[test]
    fn test_sustained_energy_is_not_a_new_beat() {
        let mut driver = BeatPulseDriver::default();
        assert!(driver.observe_energy(0.9, 0.0));
        assert!(!driver.observe_energy(0.9, 1000.0));
    }

    #[test]
    fn test_pulse_rises_then_terminates() {
        let mut driver = BeatPulseDriver::default();
        let state = music(120.0);
        driver.set_music(&state);
        driver.tick(0.0);
        assert_eq!(driver.state(), PulseState::Idle);

        driver.observe_energy(0.9, 0.0);
        let mut peak = 0.0f32;
        let mut t = 0.0;
        while t < 2000.0 {
            t += 16.0;
            let frame = driver.tick(t);
            peak = peak.max(frame.pulse_intensity);
        }
        assert!(peak > state.visual_intensity * 0.9, "peak {}", peak);
        assert!(peak <= state.visual_intensity + 1e-6);
        assert_eq!(driver.pulse_intensity(), 0.0);
        assert_eq!(driver.state(), PulseState::Idle);
    }

    #[test]
    fn test_quieter_beat_during_decay_still_terminates() {
        let mut driver = BeatPulseDriver::default();
        driver.set_music(&music(120.0));
        driver.tick(0.0);
        driver.observe_energy(0.9, 0.0);
        let mut t = 0.0;
        while t < 160.0 {
            t += 16.0;
            driver.tick(t);
        }
        let in_flight = driver.pulse_intensity();

        let quiet = quiet_music();
        assert!(quiet.visual_intensity < in_flight);
        driver.set_music(&quiet);
        driver.observe_energy(0.3, 300.0);
        assert!(driver.observe_energy(0.9, 400.0));

        t = 400.0;
        while t < 5400.0 {
            t += 16.0;
            driver.tick(t);
        }
        assert_eq!(driver.pulse_intensity(), 0.0);
        assert_eq!(driver.state(), PulseState::Idle);

        // The next beat at the same intensity rises again
        driver.observe_energy(0.3, 5900.0);
        assert!(driver.observe_energy(0.9, 6000.0));
        let mut peak = 0.0f32;
        t = 6000.0;
        while t < 6300.0 {
            t += 16.0;
            peak = peak.max(driver.tick(t).pulse_intensity);
        }
        assert!(peak > quiet.visual_intensity * 0.9, "peak {}", peak);
    }

    #[test]
    fn test_frame_rate_does_not_change_attack() {
        let state = music(120.0);
        let run = |step: f64| {
            let mut driver = BeatPulseDriver::default();
            driver.set_music(&state);
            driver.tick(0.0);
            driver.observe_energy(0.9, 0.0);
            let mut t = 0.0;
            while t < 24.0 {
                t += step;
                driver.tick(t);
            }
            driver.pulse_intensity()
        };
        let fast = run(4.0);
        let slow = run(12.0);
        assert!((fast - slow).abs() < 1e-4, "fast={} slow={}", fast, slow);
    }

    #[test]
    fn test_breathing_follows_energy() {
        let mut driver = BeatPulseDriver::default();
        driver.tick(0.0);
        let frame = driver.tick(500.0);
        assert_eq!(frame.breathing_scale, 1.0);

        driver.set_music(&music(120.0));
        let frame = driver.tick(1000.0);
        let amplitude = driver.config().breathing_max_amplitude;
        assert!((frame.breathing_scale - 1.0).abs() <= amplitude + 1e-6);
        assert!(frame.phase >= 0.0 && frame.phase < TAU);
    }

    #[test]
    fn test_bpm_estimated_from_beats_without_track_tempo() {
        let mut driver = BeatPulseDriver::default();
        for i in 0..6 {
            let t = i as f64 * 500.0;
            driver.observe_energy(0.9, t);
            driver.observe_energy(0.1, t + 100.0);
        }
        assert!((driver.estimated_bpm() - 120.0).abs() < 0.5);
    }
}
