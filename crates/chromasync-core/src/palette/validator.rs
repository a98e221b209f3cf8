//! Contrast and hue-harmony validation against a reference palette

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ReferencePalette;
use crate::color::{hue_distance, Rgb};
use crate::settings::ExpressivenessMode;

/// Where a color is going to be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationContext {
    /// Anything without a specific role
    #[default]
    General,
    /// Search field highlight
    Search,
    /// Navigation highlight
    Navigation,
    /// Foreground text
    Text,
    /// Decorative accent
    Accent,
}

impl ValidationContext {
    /// Tag name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Search => "search",
            Self::Navigation => "navigation",
            Self::Text => "text",
            Self::Accent => "accent",
        }
    }

    /// Parse a tag, unknown tags validate as `general`
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "search" => Self::Search,
            "navigation" => Self::Navigation,
            "text" => Self::Text,
            "accent" => Self::Accent,
            _ => Self::General,
        }
    }
}

impl fmt::Display for ValidationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimums for one context
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContextThresholds {
    /// Minimum WCAG contrast ratio against the background
    pub min_contrast: f32,
    /// Minimum harmony score
    pub min_harmony: f32,
}

/// Threshold tables and the pleasant-angle grid.
///
/// These are empirically tuned calibration values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationThresholds {
    /// General context
    pub general: ContextThresholds,
    /// Search context
    pub search: ContextThresholds,
    /// Navigation context
    pub navigation: ContextThresholds,
    /// Text context
    pub text: ContextThresholds,
    /// Accent context
    pub accent: ContextThresholds,
    /// Spacing of pleasant hue deltas, degrees
    pub pleasant_angle_step: f32,
    /// Distance from a pleasant delta at which harmony reaches 0, degrees
    pub pleasant_tolerance: f32,
}

impl Default for ValidationThresholds {
    fn default() -> Self {
        Self {
            general: ContextThresholds {
                min_contrast: 3.0,
                min_harmony: 0.5,
            },
            search: ContextThresholds {
                min_contrast: 4.5,
                min_harmony: 0.4,
            },
            navigation: ContextThresholds {
                min_contrast: 3.0,
                min_harmony: 0.6,
            },
            text: ContextThresholds {
                min_contrast: 4.5,
                min_harmony: 0.3,
            },
            accent: ContextThresholds {
                min_contrast: 3.0,
                min_harmony: 0.7,
            },
            pleasant_angle_step: 30.0,
            pleasant_tolerance: 20.0,
        }
    }
}

impl ValidationThresholds {
    /// Thresholds for `context`, relaxed by `mode` (never tightened)
    pub fn for_context(
        &self,
        context: ValidationContext,
        mode: ExpressivenessMode,
    ) -> ContextThresholds {
        let base = match context {
            ValidationContext::General => self.general,
            ValidationContext::Search => self.search,
            ValidationContext::Navigation => self.navigation,
            ValidationContext::Text => self.text,
            ValidationContext::Accent => self.accent,
        };
        let k = mode.threshold_multiplier().min(1.0);
        ContextThresholds {
            // Contrast ratios start at 1:1, so relax the part above 1
            min_contrast: 1.0 + (base.min_contrast - 1.0) * k,
            min_harmony: base.min_harmony * k,
        }
    }
}

/// Result of [`validate`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Both thresholds met
    pub valid: bool,
    /// WCAG contrast against the palette background
    pub contrast_ratio: f32,
    /// Best hue harmony against any accent, [0, 1]
    pub harmony_score: f32,
    /// Human-readable suggestions
    pub recommendations: Vec<String>,
    /// The input color was unparseable and black was validated instead
    pub fell_back: bool,
}

/// Best hue harmony of `color` against the palette accents.
///
/// For each accent, the hue delta is compared against the nearest multiple of
/// `pleasant_angle_step`; the score is `1 - distance / pleasant_tolerance`.
pub fn harmony_score(
    color: Rgb,
    palette: &ReferencePalette,
    thresholds: &ValidationThresholds,
) -> f32 {
    let hue = color.to_hsl().h;
    palette
        .valid_accents()
        .map(|(_, accent)| {
            let delta = hue_distance(hue, accent.to_hsl().h);
            pleasant_score(delta, thresholds)
        })
        .fold(0.0f32, f32::max)
}

fn pleasant_score(delta: f32, thresholds: &ValidationThresholds) -> f32 {
    let step = thresholds.pleasant_angle_step.max(1.0);
    let tolerance = thresholds.pleasant_tolerance.max(f32::EPSILON);
    let r = delta.rem_euclid(step);
    let distance = r.min(step - r);
    (1.0 - distance / tolerance).clamp(0.0, 1.0)
}

/// Check a color's contrast and harmony for a usage context
pub fn validate(
    color_hex: &str,
    context: ValidationContext,
    palette: &ReferencePalette,
    thresholds: &ValidationThresholds,
    mode: ExpressivenessMode,
) -> ValidationReport {
    let (color, fell_back) = Rgb::from_hex_lossy(color_hex);
    let limits = thresholds.for_context(context, mode);
    let background = palette.background();

    let contrast_ratio = color.contrast_ratio(background);
    let score = harmony_score(color, palette, thresholds);

    let mut recommendations = Vec::new();
    if fell_back {
        recommendations.push(format!("'{}' is not a valid hex color", color_hex));
    }
    if contrast_ratio < limits.min_contrast {
        let direction = if background.relative_luminance() < 0.5 {
            "lighten"
        } else {
            "darken"
        };
        recommendations.push(format!(
            "{} the color: contrast {:.2} is below {:.2} for {}",
            direction, contrast_ratio, limits.min_contrast, context
        ));
    }
    if score < limits.min_harmony {
        if let Some(hint) = nearest_pleasant_hint(color, palette, thresholds) {
            recommendations.push(hint);
        }
    }

    ValidationReport {
        valid: !fell_back && contrast_ratio >= limits.min_contrast && score >= limits.min_harmony,
        contrast_ratio,
        harmony_score: score,
        recommendations,
        fell_back,
    }
}

fn nearest_pleasant_hint(
    color: Rgb,
    palette: &ReferencePalette,
    thresholds: &ValidationThresholds,
) -> Option<String> {
    let hue = color.to_hsl().h;
    let step = thresholds.pleasant_angle_step.max(1.0);
    palette
        .valid_accents()
        .map(|(entry, accent)| {
            let delta = hue_distance(hue, accent.to_hsl().h);
            let r = delta.rem_euclid(step);
            (entry, r.min(step - r))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(entry, shift)| {
            format!(
                "rotate hue by about {:.0}° to sit on a harmonious angle from {}",
                shift, entry.name
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::{PaletteEntry, ThemeFlavor};

    fn single_accent_palette(hex: &str) -> ReferencePalette {
        let mut palette = ReferencePalette::for_theme(ThemeFlavor::Mocha);
        palette.accents = vec![PaletteEntry::new("only", hex)];
        palette
    }

    #[test]
    fn test_pleasant_score_grid() {
        let t = ValidationThresholds::default();
        assert_eq!(pleasant_score(0.0, &t), 1.0);
        assert_eq!(pleasant_score(60.0, &t), 1.0);
        assert!((pleasant_score(10.0, &t) - 0.5).abs() < 1e-6);
        assert!((pleasant_score(15.0, &t) - 0.25).abs() < 1e-6);
        assert!((pleasant_score(175.0, &t) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_harmony_score_exact_multiple() {
        // Pure red (h=0) against pure green (h=120)
        let palette = single_accent_palette("#00ff00");
        let score = harmony_score(Rgb::new(255, 0, 0), &palette, &ValidationThresholds::default());
        assert!((score - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_harmony_score_empty_palette() {
        let mut palette = ReferencePalette::default();
        palette.accents.clear();
        let score = harmony_score(Rgb::new(255, 0, 0), &palette, &ValidationThresholds::default());
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_validate_low_contrast_on_dark_theme() {
        let palette = ReferencePalette::for_theme(ThemeFlavor::Mocha);
        let report = validate(
            "#202030",
            ValidationContext::Text,
            &palette,
            &ValidationThresholds::default(),
            ExpressivenessMode::Conservative,
        );
        assert!(!report.valid);
        assert!(report.contrast_ratio < 1.5);
        assert!(report.recommendations.iter().any(|r| r.starts_with("lighten")));
    }

    #[test]
    fn test_validate_palette_accent_is_valid() {
        let palette = ReferencePalette::for_theme(ThemeFlavor::Mocha);
        let report = validate(
            "#cba6f7",
            ValidationContext::Accent,
            &palette,
            &ValidationThresholds::default(),
            ExpressivenessMode::Default,
        );
        assert!(report.valid, "{:?}", report);
        assert_eq!(report.harmony_score, 1.0);
    }

    #[test]
    fn test_invalid_hex_falls_back() {
        let palette = ReferencePalette::default();
        let report = validate(
            "oops",
            ValidationContext::General,
            &palette,
            &ValidationThresholds::default(),
            ExpressivenessMode::Default,
        );
        assert!(report.fell_back);
        assert!(!report.valid);
        assert!(!report.recommendations.is_empty());
    }

    #[test]
    fn test_expressiveness_only_relaxes() {
        let t = ValidationThresholds::default();
        for context in [
            ValidationContext::General,
            ValidationContext::Search,
            ValidationContext::Navigation,
            ValidationContext::Text,
            ValidationContext::Accent,
        ] {
            let strict = t.for_context(context, ExpressivenessMode::Conservative);
            let loose = t.for_context(context, ExpressivenessMode::Maximum);
            assert!(loose.min_contrast <= strict.min_contrast);
            assert!(loose.min_harmony <= strict.min_harmony);
            assert!(loose.min_contrast >= 1.0);
        }
    }

    #[test]
    fn test_context_tags() {
        assert_eq!(ValidationContext::from_tag("Search"), ValidationContext::Search);
        assert_eq!(ValidationContext::from_tag("sidebar"), ValidationContext::General);
    }
}
