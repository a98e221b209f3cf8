//! Perceptual color transform
//!
//! sRGB -> linear RGB -> LMS -> OKLab and back, following Björn Ottosson's
//! reference matrices, plus the contextual lightness/chroma post-processing
//! applied before colors are published.

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::rgb::{linear_to_srgb, normalize_hue, srgb_to_linear, Rgb};
use crate::music::MoodIdentifier;

/// A color in OKLab space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OklabColor {
    /// Perceptual lightness, [0, 1]
    pub l: f32,
    /// Green-red axis, roughly [-0.4, 0.4]
    pub a: f32,
    /// Blue-yellow axis, roughly [-0.4, 0.4]
    pub b: f32,
}

/// Cylindrical view of an OKLab color
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Oklch {
    /// Lightness
    pub l: f32,
    /// Chroma, `sqrt(a² + b²)`
    pub c: f32,
    /// Hue in degrees, [0, 360)
    pub h: f32,
}

impl OklabColor {
    /// Construct from components
    pub const fn new(l: f32, a: f32, b: f32) -> Self {
        Self { l, a, b }
    }

    /// Rebuild from lightness, chroma and hue (degrees)
    pub fn from_lch(l: f32, c: f32, h: f32) -> Self {
        let rad = h.to_radians();
        Self {
            l,
            a: c * rad.cos(),
            b: c * rad.sin(),
        }
    }

    /// Chroma, `sqrt(a² + b²)`
    pub fn chroma(&self) -> f32 {
        self.a.hypot(self.b)
    }

    /// Hue angle in degrees, normalized to [0, 360)
    pub fn hue(&self) -> f32 {
        normalize_hue(self.b.atan2(self.a).to_degrees())
    }

    /// Cylindrical form
    pub fn to_lch(&self) -> Oklch {
        Oklch {
            l: self.l,
            c: self.chroma(),
            h: self.hue(),
        }
    }

    /// All components finite
    pub fn is_finite(&self) -> bool {
        self.l.is_finite() && self.a.is_finite() && self.b.is_finite()
    }

    /// Componentwise linear interpolation, `t = 0` returns `self`
    pub fn lerp(&self, other: &OklabColor, t: f32) -> OklabColor {
        let t = t.clamp(0.0, 1.0);
        OklabColor {
            l: self.l + (other.l - self.l) * t,
            a: self.a + (other.a - self.a) * t,
            b: self.b + (other.b - self.b) * t,
        }
    }

    /// Scale chroma, keeping hue and lightness
    pub fn with_chroma_scaled(&self, factor: f32) -> OklabColor {
        OklabColor {
            l: self.l,
            a: self.a * factor,
            b: self.b * factor,
        }
    }

    /// Convert to 8-bit sRGB
    pub fn to_rgb(&self) -> Rgb {
        oklab_to_rgb(*self)
    }
}

impl From<Rgb> for OklabColor {
    fn from(rgb: Rgb) -> Self {
        rgb_to_oklab(rgb)
    }
}

/// Convert 8-bit sRGB to OKLab
pub fn rgb_to_oklab(rgb: Rgb) -> OklabColor {
    let [r, g, b] = rgb.to_unit();
    linear_srgb_to_oklab(srgb_to_linear(r), srgb_to_linear(g), srgb_to_linear(b))
}

/// Convert OKLab to 8-bit sRGB, hard-clipping out-of-gamut channels
pub fn oklab_to_rgb(color: OklabColor) -> Rgb {
    oklab_to_rgb_checked(color).0
}

/// Convert OKLab to 8-bit sRGB and report whether gamut clipping fired
pub fn oklab_to_rgb_checked(color: OklabColor) -> (Rgb, bool) {
    if !color.is_finite() {
        return (Rgb::BLACK, true);
    }

    let (r, g, b) = oklab_to_linear_srgb(color.l, color.a, color.b);
    // Tolerate float noise at the gamut edge before calling it a clip
    const EDGE: f32 = 1e-4;
    let clipped = [r, g, b].iter().any(|c| *c < -EDGE || *c > 1.0 + EDGE);
    if clipped {
        trace!(
            "Gamut clip: L={:.4} a={:.4} b={:.4} -> linear ({:.4}, {:.4}, {:.4})",
            color.l,
            color.a,
            color.b,
            r,
            g,
            b
        );
    }

    let encode = |c: f32| linear_to_srgb(c.clamp(0.0, 1.0));
    (Rgb::from_unit(encode(r), encode(g), encode(b)), clipped)
}

/// Linear sRGB to OKLab (M1, cube root, M2)
pub fn linear_srgb_to_oklab(r: f32, g: f32, b: f32) -> OklabColor {
    let l = 0.412_221_47 * r + 0.536_332_55 * g + 0.051_445_995 * b;
    let m = 0.211_903_5 * r + 0.680_699_5 * g + 0.107_396_96 * b;
    let s = 0.088_302_46 * r + 0.281_718_84 * g + 0.629_978_7 * b;

    let l_ = l.cbrt();
    let m_ = m.cbrt();
    let s_ = s.cbrt();

    OklabColor {
        l: 0.210_454_26 * l_ + 0.793_617_8 * m_ - 0.004_072_047 * s_,
        a: 1.977_998_5 * l_ - 2.428_592_2 * m_ + 0.450_593_7 * s_,
        b: 0.025_904_037 * l_ + 0.782_771_77 * m_ - 0.808_675_77 * s_,
    }
}

/// OKLab to linear sRGB (inverse M2, cube, inverse M1), unclamped
pub fn oklab_to_linear_srgb(l_ok: f32, a: f32, b: f32) -> (f32, f32, f32) {
    let l_ = l_ok + 0.396_337_78 * a + 0.215_803_76 * b;
    let m_ = l_ok - 0.105_561_346 * a - 0.063_854_17 * b;
    let s_ = l_ok - 0.089_484_18 * a - 1.291_485_5 * b;

    let l = l_ * l_ * l_;
    let m = m_ * m_ * m_;
    let s = s_ * s_ * s_;

    (
        4.076_741_7 * l - 3.307_711_6 * m + 0.230_969_94 * s,
        -1.268_438 * l + 2.609_757_4 * m - 0.341_319_38 * s,
        -0.004_196_086_3 * l - 0.703_418_6 * m + 1.707_614_7 * s,
    )
}

/// Music context for color post-processing.
///
/// Every field is optional; a context with nothing set only applies the
/// lightness-extreme compression.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorContext {
    /// Layout version of this struct
    pub version: u32,
    /// Processed energy of the current track
    pub music_energy: Option<f32>,
    /// Current mood
    pub mood: Option<MoodIdentifier>,
    /// Current visual intensity
    pub visual_intensity: Option<f32>,
}

impl ColorContext {
    /// Current context layout version
    pub const VERSION: u32 = 1;

    /// A context carrying no music information
    pub fn neutral() -> Self {
        Self {
            version: Self::VERSION,
            music_energy: None,
            mood: None,
            visual_intensity: None,
        }
    }
}

impl Default for ColorContext {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Tuning for [`process_oklab_color`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChromaProcessing {
    /// Below this lightness chroma is compressed toward 0
    pub dark_threshold: f32,
    /// Above this lightness chroma is compressed toward 0
    pub light_threshold: f32,
    /// Exponent of the compression curve
    pub compression_exponent: f32,
    /// Fractional chroma nudge applied for strong moods
    pub mood_nudge: f32,
    /// Whether mood nudges are applied at all
    pub mood_nudges_enabled: bool,
}

impl Default for ChromaProcessing {
    fn default() -> Self {
        Self {
            dark_threshold: 0.1,
            light_threshold: 0.9,
            compression_exponent: 1.5,
            mood_nudge: 0.05,
            mood_nudges_enabled: true,
        }
    }
}

/// Apply lightness-extreme chroma compression, mood nudges and a final
/// lightness clamp. Pure and deterministic.
pub fn process_oklab_color(
    color: OklabColor,
    context: &ColorContext,
    options: &ChromaProcessing,
) -> OklabColor {
    if !color.is_finite() {
        return OklabColor::default();
    }

    let mut factor = extreme_compression(color.l, options);

    if options.mood_nudges_enabled {
        if let (Some(mood), Some(intensity)) = (context.mood, context.visual_intensity) {
            if mood == MoodIdentifier::EnergeticHappy && intensity > 0.5 {
                factor *= 1.0 + options.mood_nudge;
            } else if mood.is_calm_or_sad() && intensity < 0.5 {
                factor *= 1.0 - options.mood_nudge;
            }
        }
    }

    let mut out = color.with_chroma_scaled(factor);
    out.l = out.l.clamp(0.0, 1.0);
    out
}

fn extreme_compression(l: f32, options: &ChromaProcessing) -> f32 {
    let l = l.clamp(0.0, 1.0);
    if l < options.dark_threshold && options.dark_threshold > 0.0 {
        (l / options.dark_threshold).powf(options.compression_exponent)
    } else if l > options.light_threshold && options.light_threshold < 1.0 {
        ((1.0 - l) / (1.0 - options.light_threshold)).powf(options.compression_exponent)
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_white_and_black() {
        let white = rgb_to_oklab(Rgb::new(255, 255, 255));
        assert!((white.l - 1.0).abs() < 1e-3, "white L={}", white.l);
        assert!(white.chroma() < 1e-3);

        let black = rgb_to_oklab(Rgb::BLACK);
        assert!(black.l.abs() < 1e-6);
    }

    #[test]
    fn test_reference_red() {
        // Reference values from Ottosson's published table
        let red = rgb_to_oklab(Rgb::new(255, 0, 0));
        assert!((red.l - 0.627_955).abs() < 1e-3);
        assert!((red.a - 0.224_863).abs() < 1e-3);
        assert!((red.b - 0.125_846).abs() < 1e-3);
    }

    #[test]
    fn test_out_of_gamut_is_clipped_and_reported() {
        let (rgb, clipped) = oklab_to_rgb_checked(OklabColor::new(0.5, 0.4, 0.4));
        assert!(clipped);
        assert_eq!(rgb.g, 0);

        let (_, clipped) = oklab_to_rgb_checked(rgb_to_oklab(Rgb::new(10, 200, 30)));
        assert!(!clipped);
    }

    #[test]
    fn test_non_finite_maps_to_black() {
        let (rgb, clipped) = oklab_to_rgb_checked(OklabColor::new(f32::NAN, 0.0, 0.0));
        assert_eq!(rgb, Rgb::BLACK);
        assert!(clipped);
    }

    #[test]
    fn test_lch_roundtrip() {
        let color = OklabColor::new(0.7, 0.05, -0.02);
        let lch = color.to_lch();
        let back = OklabColor::from_lch(lch.l, lch.c, lch.h);
        assert!((back.a - color.a).abs() < 1e-6);
        assert!((back.b - color.b).abs() < 1e-6);
        assert!(lch.h > 270.0 && lch.h < 360.0);
    }

    #[test]
    fn test_extreme_lightness_compresses_chroma() {
        let options = ChromaProcessing::default();
        let context = ColorContext::neutral();

        let dark = OklabColor::new(0.05, 0.1, 0.1);
        let out = process_oklab_color(dark, &context, &options);
        assert!(out.chroma() < dark.chroma() * 0.5);

        let light = OklabColor::new(0.97, 0.1, 0.1);
        let out = process_oklab_color(light, &context, &options);
        assert!(out.chroma() < light.chroma() * 0.5);

        let mid = OklabColor::new(0.5, 0.1, 0.1);
        let out = process_oklab_color(mid, &context, &options);
        assert_eq!(out, mid);
    }

    #[test]
    fn test_mood_nudges() {
        let options = ChromaProcessing::default();
        let color = OklabColor::new(0.6, 0.1, 0.0);

        let happy = ColorContext {
            mood: Some(MoodIdentifier::EnergeticHappy),
            visual_intensity: Some(0.8),
            ..ColorContext::neutral()
        };
        let out = process_oklab_color(color, &happy, &options);
        assert!((out.chroma() - 0.105).abs() < 1e-5);

        let sad = ColorContext {
            mood: Some(MoodIdentifier::Melancholic),
            visual_intensity: Some(0.2),
            ..ColorContext::neutral()
        };
        let out = process_oklab_color(color, &sad, &options);
        assert!((out.chroma() - 0.095).abs() < 1e-5);

        // Sad mood at high intensity is left alone
        let loud_sad = ColorContext {
            visual_intensity: Some(0.9),
            ..sad
        };
        assert_eq!(process_oklab_color(color, &loud_sad, &options), color);

        let disabled = ChromaProcessing {
            mood_nudges_enabled: false,
            ..options
        };
        assert_eq!(process_oklab_color(color, &happy, &disabled), color);
    }

    #[test]
    fn test_lightness_is_clamped() {
        let out = process_oklab_color(
            OklabColor::new(1.4, 0.0, 0.0),
            &ColorContext::neutral(),
            &ChromaProcessing::default(),
        );
        assert_eq!(out.l, 1.0);
    }

    proptest! {
        #[test]
        fn prop_srgb_roundtrip_within_one(r in 0u8..=255, g in 0u8..=255, b in 0u8..=255) {
            let original = Rgb::new(r, g, b);
            let back = oklab_to_rgb(rgb_to_oklab(original));
            prop_assert!((back.r as i16 - r as i16).abs() <= 1, "{:?} -> {:?}", original, back);
            prop_assert!((back.g as i16 - g as i16).abs() <= 1, "{:?} -> {:?}", original, back);
            prop_assert!((back.b as i16 - b as i16).abs() <= 1, "{:?} -> {:?}", original, back);
        }
    }
}
