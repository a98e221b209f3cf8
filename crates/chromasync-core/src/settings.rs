//! User settings
//!
//! Settings are persisted as flat string key/value pairs. Every key has a
//! documented default and an allow-list (or range) of valid values. Loading
//! is self-healing: invalid stored values are replaced by defaults. Writes
//! through [`Settings::set`] are validated and rejected instead.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::color::Rgb;
use crate::harmony::HarmonyRule;
use crate::palette::ThemeFlavor;
use crate::CoreError;

/// Setting key: harmony rule
pub const KEY_HARMONY_RULE: &str = "harmony-rule";
/// Setting key: rotation angle for analogous/tetradic rules
pub const KEY_HARMONIC_ANGLE: &str = "harmonic-angle";
/// Setting key: blend weight between anchor and harmonics
pub const KEY_HARMONIC_INTENSITY: &str = "harmonic-intensity";
/// Setting key: re-derive harmonics per track
pub const KEY_HARMONIC_EVOLUTION: &str = "harmonic-evolution";
/// Setting key: manual base color override
pub const KEY_MANUAL_BASE_COLOR: &str = "manual-base-color";
/// Setting key: expressiveness mode
pub const KEY_EXPRESSIVENESS: &str = "expressiveness";
/// Setting key: performance quality
pub const KEY_PERFORMANCE_QUALITY: &str = "performance-quality";
/// Setting key: reference palette theme
pub const KEY_THEME: &str = "theme";

/// All recognized keys
pub const SETTING_KEYS: [&str; 8] = [
    KEY_HARMONY_RULE,
    KEY_HARMONIC_ANGLE,
    KEY_HARMONIC_INTENSITY,
    KEY_HARMONIC_EVOLUTION,
    KEY_MANUAL_BASE_COLOR,
    KEY_EXPRESSIVENESS,
    KEY_PERFORMANCE_QUALITY,
    KEY_THEME,
];

/// How strongly the engine reacts to music
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExpressivenessMode {
    /// Subtle
    Conservative,
    /// Balanced
    #[default]
    Default,
    /// Loud
    Maximum,
}

impl ExpressivenessMode {
    /// Multiplier applied to visual intensity before clamping
    pub fn intensity_multiplier(&self) -> f32 {
        match self {
            Self::Conservative => 0.8,
            Self::Default => 1.0,
            Self::Maximum => 1.3,
        }
    }

    /// Multiplier applied to validation thresholds; never above 1
    pub fn threshold_multiplier(&self) -> f32 {
        match self {
            Self::Conservative => 1.0,
            Self::Default => 0.85,
            Self::Maximum => 0.6,
        }
    }

    /// Default dominance of the extracted color when blending
    pub fn blend_ratio(&self) -> f32 {
        match self {
            Self::Conservative => 0.3,
            Self::Default => 0.5,
            Self::Maximum => 0.7,
        }
    }

    /// Settings value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::Default => "default",
            Self::Maximum => "maximum",
        }
    }
}

impl FromStr for ExpressivenessMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "conservative" => Ok(Self::Conservative),
            "default" => Ok(Self::Default),
            "maximum" => Ok(Self::Maximum),
            _ => Err(invalid(KEY_EXPRESSIVENESS, s)),
        }
    }
}

impl fmt::Display for ExpressivenessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rendering quality trade-off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PerformanceQuality {
    /// Balanced refresh rate
    #[default]
    Auto,
    /// Fewer color refreshes, no mood nudges
    Optimized,
    /// Refresh colors every frame
    HighFidelity,
}

impl PerformanceQuality {
    /// Minimum time between palette recomputations
    pub fn color_refresh_interval_ms(&self) -> f64 {
        match self {
            Self::Auto => 33.0,
            Self::Optimized => 100.0,
            Self::HighFidelity => 0.0,
        }
    }

    /// Whether contextual chroma nudges are applied
    pub fn mood_nudges_enabled(&self) -> bool {
        !matches!(self, Self::Optimized)
    }

    /// Settings value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Optimized => "optimized",
            Self::HighFidelity => "high-fidelity",
        }
    }
}

impl FromStr for PerformanceQuality {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "optimized" => Ok(Self::Optimized),
            "high-fidelity" => Ok(Self::HighFidelity),
            _ => Err(invalid(KEY_PERFORMANCE_QUALITY, s)),
        }
    }
}

impl fmt::Display for PerformanceQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn invalid(key: &str, value: &str) -> CoreError {
    CoreError::InvalidSetting {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// A stored value that was replaced by its default during load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealedSetting {
    /// Key
    pub key: String,
    /// Rejected stored value
    pub rejected: String,
    /// Default written in its place
    pub replacement: String,
}

/// Typed view of the engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Harmony rule
    pub harmony_rule: HarmonyRule,
    /// Rotation angle for analogous/tetradic, [0, 180]
    pub harmonic_angle: f32,
    /// Blend weight between anchor and harmonics, [0, 1]
    pub harmonic_intensity: f32,
    /// Re-derive harmonics on each track change
    pub harmonic_evolution: bool,
    /// Manual base color; `None` means auto-extract
    pub manual_base_color: Option<Rgb>,
    /// Expressiveness
    pub expressiveness: ExpressivenessMode,
    /// Performance quality
    pub performance_quality: PerformanceQuality,
    /// Reference palette theme
    pub theme: ThemeFlavor,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            harmony_rule: HarmonyRule::Analogous,
            harmonic_angle: 30.0,
            harmonic_intensity: 0.6,
            harmonic_evolution: true,
            manual_base_color: None,
            expressiveness: ExpressivenessMode::Default,
            performance_quality: PerformanceQuality::Auto,
            theme: ThemeFlavor::Mocha,
        }
    }
}

impl Settings {
    /// Build from stored pairs, healing invalid values.
    ///
    /// Unknown keys are ignored. Returns the settings and every healed entry.
    pub fn load<'a, I>(pairs: I) -> (Self, Vec<HealedSetting>)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut settings = Self::default();
        let mut healed = Vec::new();

        for (key, value) in pairs {
            if !SETTING_KEYS.contains(&key) {
                continue;
            }
            if let Err(e) = settings.set(key, value) {
                let replacement = Self::default().get(key).unwrap_or_default();
                warn!(
                    "Invalid stored setting {}={:?} ({}), using default {:?}",
                    key, value, e, replacement
                );
                healed.push(HealedSetting {
                    key: key.to_string(),
                    rejected: value.to_string(),
                    replacement,
                });
            }
        }

        (settings, healed)
    }

    /// Load from an owned map
    pub fn load_map(map: &BTreeMap<String, String>) -> (Self, Vec<HealedSetting>) {
        Self::load(map.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// Validate and apply one write. Invalid values leave settings unchanged.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), CoreError> {
        match key {
            KEY_HARMONY_RULE => self.harmony_rule = value.parse()?,
            KEY_HARMONIC_ANGLE => {
                self.harmonic_angle = parse_ranged(key, value, 0.0, 180.0)?;
            }
            KEY_HARMONIC_INTENSITY => {
                self.harmonic_intensity = parse_ranged(key, value, 0.0, 1.0)?;
            }
            KEY_HARMONIC_EVOLUTION => {
                self.harmonic_evolution = match value.trim() {
                    "true" => true,
                    "false" => false,
                    _ => return Err(invalid(key, value)),
                };
            }
            KEY_MANUAL_BASE_COLOR => {
                self.manual_base_color = if value.trim().is_empty() {
                    None
                } else {
                    Some(Rgb::from_hex(value).map_err(|_| invalid(key, value))?)
                };
            }
            KEY_EXPRESSIVENESS => self.expressiveness = value.parse()?,
            KEY_PERFORMANCE_QUALITY => self.performance_quality = value.parse()?,
            KEY_THEME => self.theme = value.parse()?,
            _ => return Err(CoreError::UnknownSetting(key.to_string())),
        }
        Ok(())
    }

    /// Current value of `key` as stored text
    pub fn get(&self, key: &str) -> Option<String> {
        let value = match key {
            KEY_HARMONY_RULE => self.harmony_rule.as_str().to_string(),
            KEY_HARMONIC_ANGLE => self.harmonic_angle.to_string(),
            KEY_HARMONIC_INTENSITY => self.harmonic_intensity.to_string(),
            KEY_HARMONIC_EVOLUTION => self.harmonic_evolution.to_string(),
            KEY_MANUAL_BASE_COLOR => self
                .manual_base_color
                .map(Rgb::to_hex)
                .unwrap_or_default(),
            KEY_EXPRESSIVENESS => self.expressiveness.as_str().to_string(),
            KEY_PERFORMANCE_QUALITY => self.performance_quality.as_str().to_string(),
            KEY_THEME => self.theme.as_str().to_string(),
            _ => return None,
        };
        Some(value)
    }

    /// All settings as stored pairs
    pub fn to_map(&self) -> BTreeMap<String, String> {
        SETTING_KEYS
            .iter()
            .filter_map(|key| self.get(key).map(|v| (key.to_string(), v)))
            .collect()
    }
}

fn parse_ranged(key: &str, value: &str, min: f32, max: f32) -> Result<f32, CoreError> {
    let parsed: f32 = value.trim().parse().map_err(|_| invalid(key, value))?;
    if !parsed.is_finite() || parsed < min || parsed > max {
        return Err(invalid(key, value));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.harmony_rule, HarmonyRule::Analogous);
        assert_eq!(settings.harmonic_intensity, 0.6);
        assert!(settings.harmonic_evolution);
        assert_eq!(settings.manual_base_color, None);
        assert_eq!(settings.expressiveness, ExpressivenessMode::Default);
        assert_eq!(settings.performance_quality, PerformanceQuality::Auto);
    }

    #[test]
    fn test_set_rejects_invalid_values() {
        let mut settings = Settings::default();
        assert!(settings.set(KEY_HARMONY_RULE, "pentadic").is_err());
        assert!(settings.set(KEY_HARMONIC_INTENSITY, "1.5").is_err());
        assert!(settings.set(KEY_HARMONIC_INTENSITY, "NaN").is_err());
        assert!(settings.set(KEY_HARMONIC_EVOLUTION, "yes").is_err());
        assert!(settings.set(KEY_MANUAL_BASE_COLOR, "#zzzzzz").is_err());
        assert!(settings.set(KEY_EXPRESSIVENESS, "loud").is_err());
        assert!(matches!(
            settings.set("volume", "11"),
            Err(CoreError::UnknownSetting(_))
        ));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_set_accepts_valid_values() {
        let mut settings = Settings::default();
        settings.set(KEY_HARMONY_RULE, "triadic").unwrap();
        settings.set(KEY_MANUAL_BASE_COLOR, "#ff8800").unwrap();
        settings.set(KEY_PERFORMANCE_QUALITY, "high-fidelity").unwrap();
        settings.set(KEY_THEME, "latte").unwrap();
        assert_eq!(settings.harmony_rule, HarmonyRule::Triadic);
        assert_eq!(settings.manual_base_color, Some(Rgb::new(255, 136, 0)));
        assert_eq!(settings.performance_quality, PerformanceQuality::HighFidelity);
        assert_eq!(settings.theme, ThemeFlavor::Latte);

        settings.set(KEY_MANUAL_BASE_COLOR, "").unwrap();
        assert_eq!(settings.manual_base_color, None);
    }

    #[test]
    fn test_load_heals_invalid_values() {
        let pairs = [
            (KEY_HARMONY_RULE, "complementary"),
            (KEY_EXPRESSIVENESS, "extreme"),
            (KEY_HARMONIC_INTENSITY, "-2"),
            ("legacy-key", "whatever"),
        ];
        let (settings, healed) = Settings::load(pairs);
        assert_eq!(settings.harmony_rule, HarmonyRule::Complementary);
        assert_eq!(settings.expressiveness, ExpressivenessMode::Default);
        assert_eq!(settings.harmonic_intensity, 0.6);
        assert_eq!(healed.len(), 2);
        assert_eq!(healed[0].key, KEY_EXPRESSIVENESS);
        assert_eq!(healed[0].replacement, "default");
    }

    #[test]
    fn test_map_roundtrip() {
        let mut settings = Settings::default();
        settings.set(KEY_HARMONY_RULE, "split-complementary").unwrap();
        settings.set(KEY_MANUAL_BASE_COLOR, "#123456").unwrap();
        let map = settings.to_map();
        assert_eq!(map.len(), SETTING_KEYS.len());
        let (loaded, healed) = Settings::load_map(&map);
        assert!(healed.is_empty());
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_threshold_multiplier_never_raises() {
        for mode in [
            ExpressivenessMode::Conservative,
            ExpressivenessMode::Default,
            ExpressivenessMode::Maximum,
        ] {
            assert!(mode.threshold_multiplier() <= 1.0);
        }
    }
}
