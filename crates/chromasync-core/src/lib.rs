//! ChromaSync Core - Palette and Animation Engine
//!
//! This crate contains the synchronous, frame-safe half of ChromaSync:
//! - Framerate-independent smoothing
//! - sRGB/HSL/OKLab color science and smoothed color transitions
//! - Harmonic palette generation
//! - Reference palettes, harmony validation and accent blending
//! - Music feature normalization
//! - Beat-pulse driver
//! - Settings and styling-variable publishing
//!
//! Nothing here blocks or returns errors from the frame path; malformed input
//! resolves to documented fallbacks. Only settings writes are rejected.

#![warn(missing_docs)]

use thiserror::Error;

pub mod color;
pub mod engine;
pub mod harmony;
pub mod logging;
pub mod music;
pub mod palette;
pub mod pulse;
pub mod settings;
pub mod smoothing;
pub mod variables;

// --- Re-exports grouped by category ---

// Color science
pub use color::{
    oklab_to_rgb, oklab_to_rgb_checked, process_oklab_color, rgb_to_oklab, ChromaProcessing,
    ColorContext, ColorTransition, Hsl, OklabColor, Oklch, Rgb,
};
pub use harmony::{generate_harmonics, generate_harmonics_named, HarmonicColorSet, HarmonyRule};
pub use smoothing::SmootherState;

// Palettes
pub use palette::{
    blend, find_best_accent, validate, AccentMatch, BlendConfig, BlendRatioModulator,
    PaletteEntry, ReferencePalette, ThemeFlavor, ValidationContext, ValidationReport,
    ValidationThresholds,
};

// Music & animation
pub use music::{
    AudioFeatureSample, FeatureProcessor, FeatureWeights, MoodIdentifier, ProcessedMusicState,
    RawAudioFeatures,
};
pub use pulse::{BeatPulseDriver, PulseConfig, PulseFrame, PulseState};

// Engine & publishing
pub use engine::{EngineConfig, EngineFrame, PaletteEngine, TransitionConfig};
pub use variables::{SharedVariableStore, VariableBatch, VariableStore};

// Settings & logging
pub use logging::LogConfig;
pub use settings::{ExpressivenessMode, HealedSetting, PerformanceQuality, Settings};

/// Core error types
#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed color string
    #[error("Invalid color: {0}")]
    InvalidColor(String),

    /// Disallowed value for a known setting
    #[error("Invalid setting {key}={value}")]
    InvalidSetting {
        /// Setting key
        key: String,
        /// Rejected value
        value: String,
    },

    /// Setting key that does not exist
    #[error("Unknown setting: {0}")]
    UnknownSetting(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
