//! Blending extracted colors with reference accents

use serde::{Deserialize, Serialize};

use super::{ReferencePalette, DEFAULT_ACCENT, DEFAULT_ACCENT_NAME};
use crate::color::{hue_distance, normalize_hue, Hsl, Rgb};
use crate::smoothing::SmootherState;

/// Blend tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlendConfig {
    /// Saturation floor of every blended color
    pub min_saturation: f32,
    /// Saturation multiplier applied after blending
    pub saturation_boost: f32,
    /// Lightness multiplier applied after blending
    pub lightness_boost: f32,
    /// Lightness range of blended colors
    pub min_lightness: f32,
    /// Lightness range of blended colors
    pub max_lightness: f32,
    /// Degrees of hue distance forgiven per unit of accent saturation
    pub saturation_bonus_degrees: f32,
    /// Half-life of the music-reactive ratio multiplier, seconds
    pub modulation_half_life: f32,
    /// Multiplier swing contributed by energy
    pub energy_weight: f32,
    /// Multiplier swing contributed by valence
    pub valence_weight: f32,
    /// Multiplier bounds
    pub min_multiplier: f32,
    /// Multiplier bounds
    pub max_multiplier: f32,
}

impl Default for BlendConfig {
    fn default() -> Self {
        Self {
            min_saturation: 0.6,
            saturation_boost: 1.1,
            lightness_boost: 1.05,
            min_lightness: 0.2,
            max_lightness: 0.8,
            saturation_bonus_degrees: 15.0,
            modulation_half_life: 0.5,
            energy_weight: 0.4,
            valence_weight: 0.2,
            min_multiplier: 0.7,
            max_multiplier: 1.3,
        }
    }
}

/// A blended color in both HSL and 8-bit form
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlendedColor {
    /// Exact blend result
    pub hsl: Hsl,
    /// Quantized sRGB
    pub rgb: Rgb,
}

impl BlendedColor {
    /// `#rrggbb`
    pub fn hex(&self) -> String {
        self.rgb.to_hex()
    }
}

/// Blend `extracted` with `reference`.
///
/// `ratio` is the dominance of the extracted color: 0 keeps the reference hue
/// and lightness, 1 keeps the extracted ones. Saturation is floored at
/// `min_saturation` instead of being interpolated, so washed-out album art
/// never drags the accent toward gray.
pub fn blend(extracted: Rgb, reference: Rgb, ratio: f32, config: &BlendConfig) -> BlendedColor {
    let ratio = if ratio.is_finite() {
        ratio.clamp(0.0, 1.0)
    } else {
        0.5
    };
    let ext = extracted.to_hsl();
    let refc = reference.to_hsl();

    let h = lerp_hue(refc.h, ext.h, ratio);
    let l = ((refc.l + (ext.l - refc.l) * ratio) * config.lightness_boost)
        .clamp(config.min_lightness, config.max_lightness);
    // Floor applies before the boost
    let s = (refc.s + (ext.s - refc.s) * ratio).max(config.min_saturation);
    let s = (s * config.saturation_boost).clamp(config.min_saturation, 1.0);

    let hsl = Hsl::new(h, s, l);
    BlendedColor {
        hsl,
        rgb: hsl.to_rgb(),
    }
}

fn lerp_hue(from: f32, to: f32, t: f32) -> f32 {
    let mut delta = normalize_hue(to) - normalize_hue(from);
    if delta > 180.0 {
        delta -= 360.0;
    } else if delta < -180.0 {
        delta += 360.0;
    }
    normalize_hue(from + delta * t)
}

/// Accent chosen by [`find_best_accent`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccentMatch {
    /// Accent name
    pub name: String,
    /// Accent color
    pub rgb: Rgb,
    /// Hue distance minus saturation bonus (lower is better)
    pub score: f32,
    /// The palette had no usable entries and the default accent was used
    pub fell_back: bool,
}

/// Pick the accent closest in hue to `color`, favoring saturated accents
pub fn find_best_accent(
    color: Rgb,
    palette: &ReferencePalette,
    config: &BlendConfig,
) -> AccentMatch {
    let hue = color.to_hsl().h;

    palette
        .valid_accents()
        .map(|(entry, rgb)| {
            let accent = rgb.to_hsl();
            let score = hue_distance(hue, accent.h) - accent.s * config.saturation_bonus_degrees;
            AccentMatch {
                name: entry.name.clone(),
                rgb,
                score,
                fell_back: false,
            }
        })
        .min_by(|a, b| a.score.total_cmp(&b.score))
        .unwrap_or_else(|| {
            tracing::debug!("Palette has no usable accents, using {}", DEFAULT_ACCENT_NAME);
            AccentMatch {
                name: DEFAULT_ACCENT_NAME.to_string(),
                rgb: DEFAULT_ACCENT,
                score: f32::INFINITY,
                fell_back: true,
            }
        })
}

/// Smoothed, music-reactive multiplier for the blend ratio
#[derive(Debug, Clone)]
pub struct BlendRatioModulator {
    state: SmootherState,
    config: BlendConfig,
}

impl BlendRatioModulator {
    /// Start at a neutral multiplier of 1
    pub fn new(config: BlendConfig) -> Self {
        Self {
            state: SmootherState::new(1.0),
            config,
        }
    }

    /// Retarget from the current track's processed energy and valence
    pub fn update_music(&mut self, energy: f32, valence: f32) {
        let c = &self.config;
        let target = 1.0
            + (energy - 0.5) * 2.0 * c.energy_weight
            + (valence - 0.5) * 2.0 * c.valence_weight;
        let target = if target.is_finite() { target } else { 1.0 };
        self.state
            .set_target(target.clamp(c.min_multiplier, c.max_multiplier));
    }

    /// Advance the multiplier to `now_ms`
    pub fn advance_to(&mut self, now_ms: f64) -> f32 {
        self.state.advance_to(now_ms, self.config.modulation_half_life)
    }

    /// Current multiplier
    pub fn multiplier(&self) -> f32 {
        self.state.current
    }

    /// `base_ratio` scaled by the current multiplier, clamped to [0, 1]
    pub fn effective_ratio(&self, base_ratio: f32) -> f32 {
        (base_ratio * self.state.current).clamp(0.0, 1.0)
    }
}

impl Default for BlendRatioModulator {
    fn default() -> Self {
        Self::new(BlendConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::{PaletteEntry, ThemeFlavor};
    use proptest::prelude::*;

    #[test]
    fn test_gray_input_keeps_saturation_floor() {
        let config = BlendConfig::default();
        let out = blend(Rgb::new(128, 128, 128), Rgb::new(140, 140, 140), 1.0, &config);
        assert!(out.hsl.s >= config.min_saturation);
    }

    #[test]
    fn test_ratio_endpoints_follow_hue() {
        let config = BlendConfig::default();
        let red = Rgb::new(220, 40, 40);
        let blue = Rgb::new(40, 40, 220);

        let all_extracted = blend(red, blue, 1.0, &config);
        assert!(hue_distance(all_extracted.hsl.h, 0.0) < 1.0);

        let all_reference = blend(red, blue, 0.0, &config);
        assert!(hue_distance(all_reference.hsl.h, 240.0) < 1.0);
    }

    #[test]
    fn test_hue_blend_takes_short_arc() {
        assert!((lerp_hue(350.0, 10.0, 0.5) - 0.0).abs() < 1e-4);
        assert!((lerp_hue(10.0, 350.0, 0.25) - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_nan_ratio_uses_midpoint() {
        let config = BlendConfig::default();
        let a = blend(Rgb::new(200, 0, 0), Rgb::new(0, 0, 200), f32::NAN, &config);
        let b = blend(Rgb::new(200, 0, 0), Rgb::new(0, 0, 200), 0.5, &config);
        assert_eq!(a, b);
    }

    #[test]
    fn test_find_best_accent_picks_nearest_hue() {
        let palette = ReferencePalette::for_theme(ThemeFlavor::Mocha);
        let config = BlendConfig::default();
        let matched = find_best_accent(Rgb::new(40, 200, 60), &palette, &config);
        assert_eq!(matched.name, "green");
        assert!(!matched.fell_back);
    }

    #[test]
    fn test_find_best_accent_on_broken_palette() {
        let mut palette = ReferencePalette::default();
        palette.accents = vec![PaletteEntry::new("broken", "#xyzxyz")];
        let matched = find_best_accent(Rgb::new(40, 200, 60), &palette, &BlendConfig::default());
        assert!(matched.fell_back);
        assert_eq!(matched.rgb, DEFAULT_ACCENT);

        palette.accents.clear();
        assert!(find_best_accent(Rgb::BLACK, &palette, &BlendConfig::default()).fell_back);
    }

    #[test]
    fn test_modulator_tracks_energy() {
        let mut modulator = BlendRatioModulator::default();
        modulator.advance_to(0.0);
        modulator.update_music(1.0, 1.0);
        modulator.advance_to(10_000.0);
        assert!((modulator.multiplier() - 1.3).abs() < 1e-3);
        assert_eq!(modulator.effective_ratio(0.9), 1.0);

        modulator.update_music(0.0, 0.0);
        modulator.advance_to(20_000.0);
        assert!((modulator.multiplier() - 0.7).abs() < 1e-3);
        assert!((modulator.effective_ratio(0.5) - 0.35).abs() < 1e-3);
    }

    proptest! {
        #[test]
        fn prop_saturation_floor(
            er in 0u8..=255, eg in 0u8..=255, eb in 0u8..=255,
            rr in 0u8..=255, rg in 0u8..=255, rb in 0u8..=255,
            ratio in 0.0f32..=1.0,
        ) {
            let config = BlendConfig::default();
            let out = blend(Rgb::new(er, eg, eb), Rgb::new(rr, rg, rb), ratio, &config);
            prop_assert!(out.hsl.s >= config.min_saturation);
            // 8-bit quantization may cost a little saturation
            prop_assert!(out.rgb.to_hsl().s >= config.min_saturation - 0.025, "{:?}", out);
        }
    }
}
