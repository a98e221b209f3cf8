//! Music feature normalization
//!
//! Turns a per-track [`AudioFeatureSample`] from the host into a
//! [`ProcessedMusicState`]: band-rescaled energy/valence, a bounded visual
//! intensity, an animation speed factor and a discrete mood.
//! This is the pure half of the analysis service; fetching, caching and
//! fan-out live in `chromasync-control`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::settings::ExpressivenessMode;

/// Per-track audio feature snapshot as delivered by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatureSample {
    /// Host track identifier
    pub track_id: String,
    /// Energy, [0, 1]
    pub energy: f32,
    /// Valence (musical positiveness), [0, 1]
    pub valence: f32,
    /// Danceability, [0, 1]
    pub danceability: f32,
    /// Tempo in BPM, > 0
    pub tempo_bpm: f32,
    /// Track duration
    pub duration_ms: u64,
}

impl AudioFeatureSample {
    /// Neutral energy/valence/danceability used when the host cannot deliver
    pub const SAFE_LEVEL: f32 = 0.5;
    /// Tempo used when the host cannot deliver
    pub const SAFE_TEMPO_BPM: f32 = 120.0;

    /// Safe default features for `track_id`
    pub fn safe_default(track_id: impl Into<String>) -> Self {
        Self {
            track_id: track_id.into(),
            energy: Self::SAFE_LEVEL,
            valence: Self::SAFE_LEVEL,
            danceability: Self::SAFE_LEVEL,
            tempo_bpm: Self::SAFE_TEMPO_BPM,
            duration_ms: 0,
        }
    }

    /// Copy with every field forced into its documented range
    pub fn sanitized(&self) -> Self {
        let unit = |v: f32| {
            if v.is_finite() {
                v.clamp(0.0, 1.0)
            } else {
                Self::SAFE_LEVEL
            }
        };
        Self {
            track_id: self.track_id.clone(),
            energy: unit(self.energy),
            valence: unit(self.valence),
            danceability: unit(self.danceability),
            tempo_bpm: if self.tempo_bpm.is_finite() && self.tempo_bpm > 0.0 {
                self.tempo_bpm
            } else {
                Self::SAFE_TEMPO_BPM
            },
            duration_ms: self.duration_ms,
        }
    }
}

/// Possibly partial feature payload from the host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawAudioFeatures {
    /// Energy
    #[serde(default)]
    pub energy: Option<f32>,
    /// Valence
    #[serde(default)]
    pub valence: Option<f32>,
    /// Danceability
    #[serde(default)]
    pub danceability: Option<f32>,
    /// Tempo in BPM
    #[serde(default, alias = "tempo")]
    pub tempo_bpm: Option<f32>,
    /// Duration
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

impl RawAudioFeatures {
    /// True when no core feature is present
    pub fn is_empty(&self) -> bool {
        self.energy.is_none()
            && self.valence.is_none()
            && self.danceability.is_none()
            && self.tempo_bpm.is_none()
    }

    /// True when some but not all core features are present
    pub fn is_partial(&self) -> bool {
        !self.is_empty()
            && (self.energy.is_none()
                || self.valence.is_none()
                || self.danceability.is_none()
                || self.tempo_bpm.is_none())
    }

    /// Complete the payload with safe defaults and sanitize it
    pub fn into_sample(self, track_id: impl Into<String>) -> AudioFeatureSample {
        AudioFeatureSample {
            track_id: track_id.into(),
            energy: self.energy.unwrap_or(AudioFeatureSample::SAFE_LEVEL),
            valence: self.valence.unwrap_or(AudioFeatureSample::SAFE_LEVEL),
            danceability: self.danceability.unwrap_or(AudioFeatureSample::SAFE_LEVEL),
            tempo_bpm: self.tempo_bpm.unwrap_or(AudioFeatureSample::SAFE_TEMPO_BPM),
            duration_ms: self.duration_ms.unwrap_or(0),
        }
        .sanitized()
    }
}

/// Discrete mood derived from processed energy, valence and danceability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoodIdentifier {
    /// High energy, high valence
    EnergeticHappy,
    /// High energy, low valence
    Intense,
    /// High energy, middling valence
    Energetic,
    /// Low energy, high valence
    Peaceful,
    /// Low energy, low valence
    Melancholic,
    /// Low energy, middling valence
    Calm,
    /// Middling energy, very danceable
    Groovy,
    /// Everything else
    #[default]
    Balanced,
}

impl MoodIdentifier {
    /// Stable snake_case identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EnergeticHappy => "energetic_happy",
            Self::Intense => "intense",
            Self::Energetic => "energetic",
            Self::Peaceful => "peaceful",
            Self::Melancholic => "melancholic",
            Self::Calm => "calm",
            Self::Groovy => "groovy",
            Self::Balanced => "balanced",
        }
    }

    /// Moods that get a chroma reduction at low intensity
    pub fn is_calm_or_sad(&self) -> bool {
        matches!(self, Self::Peaceful | Self::Melancholic | Self::Calm)
    }
}

impl fmt::Display for MoodIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Low/medium/high classification of a [0,1] feature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureBand {
    /// Below `low_band_max`
    Low,
    /// Between the band edges
    Medium,
    /// At or above `high_band_min`
    High,
}

/// Weights and thresholds for feature correction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureWeights {
    /// Upper edge of the low band
    pub low_band_max: f32,
    /// Lower edge of the high band
    pub high_band_min: f32,
    /// Energy scale in the low band
    pub low_energy_scale: f32,
    /// Slope above `high_band_min` in the high energy band
    pub high_energy_slope: f32,
    /// Valence scale in the low band
    pub low_valence_scale: f32,
    /// Valence scale in the high band
    pub high_valence_scale: f32,
    /// Share of processed energy taken from normalized tempo
    pub tempo_weight: f32,
    /// Tempo mapped to 0
    pub tempo_floor_bpm: f32,
    /// Tempo mapped to 1
    pub tempo_ceiling_bpm: f32,
    /// Share of processed valence taken from danceability
    pub danceability_valence_weight: f32,
    /// Share of visual intensity taken from processed energy (rest is danceability)
    pub intensity_energy_weight: f32,
    /// Mood threshold for "high"
    pub mood_high: f32,
    /// Mood threshold for "low"
    pub mood_low: f32,
    /// Danceability at which middling-energy tracks become groovy
    pub groovy_danceability: f32,
}

impl Default for FeatureWeights {
    fn default() -> Self {
        Self {
            low_band_max: 0.33,
            high_band_min: 0.66,
            low_energy_scale: 0.85,
            high_energy_slope: 1.2,
            low_valence_scale: 0.9,
            high_valence_scale: 1.05,
            tempo_weight: 0.15,
            tempo_floor_bpm: 60.0,
            tempo_ceiling_bpm: 180.0,
            danceability_valence_weight: 0.1,
            intensity_energy_weight: 0.6,
            mood_high: 0.6,
            mood_low: 0.4,
            groovy_danceability: 0.7,
        }
    }
}

impl FeatureWeights {
    fn band(&self, value: f32) -> FeatureBand {
        if value < self.low_band_max {
            FeatureBand::Low
        } else if value >= self.high_band_min {
            FeatureBand::High
        } else {
            FeatureBand::Medium
        }
    }
}

/// Derived, cacheable per-track state. All normalized fields are in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedMusicState {
    /// Host track identifier
    pub track_id: String,
    /// Sanitized input features
    pub features: AudioFeatureSample,
    /// Band-corrected energy
    pub processed_energy: f32,
    /// Band-corrected valence
    pub processed_valence: f32,
    /// Bounded intensity driving downstream effects
    pub visual_intensity: f32,
    /// Animation speed multiplier, >= 0
    pub animation_speed_factor: f32,
    /// Discrete mood
    pub mood: MoodIdentifier,
    /// When this state was computed (ms since the Unix epoch)
    pub timestamp_ms: u64,
    /// True when the features were substituted defaults
    pub fell_back: bool,
}

impl ProcessedMusicState {
    /// Tempo of the underlying track
    pub fn tempo_bpm(&self) -> f32 {
        self.features.tempo_bpm
    }
}

/// Pure feature-to-state transform
#[derive(Debug, Clone, Default)]
pub struct FeatureProcessor {
    weights: FeatureWeights,
    expressiveness: ExpressivenessMode,
}

impl FeatureProcessor {
    /// Create with explicit weights
    pub fn new(weights: FeatureWeights, expressiveness: ExpressivenessMode) -> Self {
        Self {
            weights,
            expressiveness,
        }
    }

    /// Current expressiveness mode
    pub fn expressiveness(&self) -> ExpressivenessMode {
        self.expressiveness
    }

    /// Change the expressiveness mode
    pub fn set_expressiveness(&mut self, mode: ExpressivenessMode) {
        self.expressiveness = mode;
    }

    /// Weights in use
    pub fn weights(&self) -> &FeatureWeights {
        &self.weights
    }

    /// Band-rescale and tempo-correct energy
    pub fn process_energy(&self, energy: f32, tempo_bpm: f32) -> f32 {
        let w = &self.weights;
        let banded = match w.band(energy) {
            FeatureBand::Low => energy * w.low_energy_scale,
            FeatureBand::Medium => energy,
            FeatureBand::High => w.high_band_min + (energy - w.high_band_min) * w.high_energy_slope,
        };
        let span = (w.tempo_ceiling_bpm - w.tempo_floor_bpm).max(1.0);
        let tempo_norm = ((tempo_bpm - w.tempo_floor_bpm) / span).clamp(0.0, 1.0);
        (banded.clamp(0.0, 1.0) * (1.0 - w.tempo_weight) + tempo_norm * w.tempo_weight)
            .clamp(0.0, 1.0)
    }

    /// Band-rescale valence and fold in danceability
    pub fn process_valence(&self, valence: f32, danceability: f32) -> f32 {
        let w = &self.weights;
        let banded = match w.band(valence) {
            FeatureBand::Low => valence * w.low_valence_scale,
            FeatureBand::Medium => valence,
            FeatureBand::High => valence * w.high_valence_scale,
        };
        (banded.clamp(0.0, 1.0) * (1.0 - w.danceability_valence_weight)
            + danceability * w.danceability_valence_weight)
            .clamp(0.0, 1.0)
    }

    /// Combined energy/danceability intensity, amplified by expressiveness then clamped
    pub fn visual_intensity(&self, processed_energy: f32, danceability: f32) -> f32 {
        let w = &self.weights;
        let raw = processed_energy * w.intensity_energy_weight
            + danceability * (1.0 - w.intensity_energy_weight);
        (raw * self.expressiveness.intensity_multiplier()).clamp(0.0, 1.0)
    }

    /// Speed factor gated by danceability
    pub fn animation_speed_factor(&self, danceability: f32) -> f32 {
        if danceability < 0.3 {
            0.6
        } else if danceability < 0.7 {
            1.0
        } else {
            1.0 + (danceability - 0.7) * 2.0
        }
    }

    /// Total mood classification
    pub fn classify_mood(&self, energy: f32, valence: f32, danceability: f32) -> MoodIdentifier {
        let w = &self.weights;
        if energy >= w.mood_high {
            if valence >= w.mood_high {
                MoodIdentifier::EnergeticHappy
            } else if valence < w.mood_low {
                MoodIdentifier::Intense
            } else {
                MoodIdentifier::Energetic
            }
        } else if energy < w.mood_low {
            if valence >= w.mood_high {
                MoodIdentifier::Peaceful
            } else if valence < w.mood_low {
                MoodIdentifier::Melancholic
            } else {
                MoodIdentifier::Calm
            }
        } else if danceability >= w.groovy_danceability {
            MoodIdentifier::Groovy
        } else {
            MoodIdentifier::Balanced
        }
    }

    /// Full transform
    pub fn process(&self, sample: &AudioFeatureSample, timestamp_ms: u64) -> ProcessedMusicState {
        let features = sample.sanitized();
        let processed_energy = self.process_energy(features.energy, features.tempo_bpm);
        let processed_valence = self.process_valence(features.valence, features.danceability);
        let visual_intensity = self.visual_intensity(processed_energy, features.danceability);
        let mood = self.classify_mood(processed_energy, processed_valence, features.danceability);

        ProcessedMusicState {
            track_id: features.track_id.clone(),
            processed_energy,
            processed_valence,
            visual_intensity,
            animation_speed_factor: self.animation_speed_factor(features.danceability),
            mood,
            timestamp_ms,
            fell_back: false,
            features,
        }
    }

    /// Transform safe default features, tagging the result as a fallback
    pub fn process_fallback(&self, track_id: &str, timestamp_ms: u64) -> ProcessedMusicState {
        let mut state = self.process(&AudioFeatureSample::safe_default(track_id), timestamp_ms);
        state.fell_back = true;
        state
    }
}
