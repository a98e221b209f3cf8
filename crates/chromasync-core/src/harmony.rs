//! Harmonic palette generation
//!
//! Derives 1-3 sibling colors from one OKLab anchor by rotating hue (or, for
//! monochromatic, shifting lightness) in cylindrical L/C/h form.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::color::{normalize_hue, OklabColor};
use crate::CoreError;

/// Split used by split-complementary. Fixed: the caller's angle is not consulted.
pub const SPLIT_COMPLEMENTARY_OFFSET: f32 = 30.0;

/// Hue relationship used to derive siblings from an anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HarmonyRule {
    /// `h ± angle`
    #[default]
    Analogous,
    /// `h + 180`
    Complementary,
    /// `h + 120`, `h + 240`
    Triadic,
    /// `h + 150`, `h + 210`
    SplitComplementary,
    /// `h + angle`, `h + 2·angle`, `h + 3·angle`
    Tetradic,
    /// Darker and lighter variants at reduced chroma
    Monochromatic,
}

impl HarmonyRule {
    /// All rules in settings order
    pub const ALL: [HarmonyRule; 6] = [
        HarmonyRule::Analogous,
        HarmonyRule::Complementary,
        HarmonyRule::Triadic,
        HarmonyRule::SplitComplementary,
        HarmonyRule::Tetradic,
        HarmonyRule::Monochromatic,
    ];

    /// Settings key value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analogous => "analogous",
            Self::Complementary => "complementary",
            Self::Triadic => "triadic",
            Self::SplitComplementary => "split-complementary",
            Self::Tetradic => "tetradic",
            Self::Monochromatic => "monochromatic",
        }
    }

    /// Angle used when the caller supplies none
    pub fn default_angle(&self) -> f32 {
        match self {
            Self::Tetradic => 90.0,
            _ => 30.0,
        }
    }

    /// Parse a rule name, falling back to analogous for unknown names.
    ///
    /// The second element reports whether the fallback was used.
    pub fn parse_lossy(name: &str) -> (HarmonyRule, bool) {
        match name.parse() {
            Ok(rule) => (rule, false),
            Err(_) => {
                debug!("Unknown harmony rule {:?}, using analogous", name);
                (HarmonyRule::Analogous, true)
            }
        }
    }
}

impl fmt::Display for HarmonyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HarmonyRule {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "analogous" => Ok(Self::Analogous),
            "complementary" => Ok(Self::Complementary),
            "triadic" => Ok(Self::Triadic),
            "split-complementary" | "splitcomplementary" => Ok(Self::SplitComplementary),
            "tetradic" | "square" => Ok(Self::Tetradic),
            "monochromatic" => Ok(Self::Monochromatic),
            _ => Err(CoreError::InvalidSetting {
                key: "harmony-rule".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Ordered list of 1-3 derived colors.
///
/// Empty only when the anchor was unusable; callers then use the anchor alone.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HarmonicColorSet {
    colors: Vec<OklabColor>,
}

impl HarmonicColorSet {
    /// Derived colors in rule order
    pub fn colors(&self) -> &[OklabColor] {
        &self.colors
    }

    /// Number of derived colors
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    /// True when generation failed
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Color at `index`, wrapping; `None` only when empty
    pub fn get_wrapped(&self, index: usize) -> Option<OklabColor> {
        if self.colors.is_empty() {
            None
        } else {
            Some(self.colors[index % self.colors.len()])
        }
    }

    /// Colors ordered darkest first
    pub fn sorted_by_lightness(&self) -> Vec<OklabColor> {
        let mut sorted = self.colors.clone();
        sorted.sort_by(|a, b| a.l.total_cmp(&b.l));
        sorted
    }
}

/// Derive harmonic siblings of `anchor` under `rule`.
///
/// `angle_degrees` is used by analogous and tetradic; `None` selects the
/// rule's default. Pure: identical inputs always yield identical output.
pub fn generate_harmonics(
    anchor: OklabColor,
    rule: HarmonyRule,
    angle_degrees: Option<f32>,
) -> HarmonicColorSet {
    if !anchor.is_finite() {
        return HarmonicColorSet::default();
    }

    let lch = anchor.to_lch();
    let angle = angle_degrees
        .filter(|a| a.is_finite())
        .unwrap_or_else(|| rule.default_angle());
    let rotate = |offset: f32| OklabColor::from_lch(lch.l, lch.c, normalize_hue(lch.h + offset));

    let colors = match rule {
        HarmonyRule::Analogous => vec![rotate(angle), rotate(-angle)],
        HarmonyRule::Complementary => vec![rotate(180.0)],
        HarmonyRule::Triadic => vec![rotate(120.0), rotate(240.0)],
        HarmonyRule::SplitComplementary => vec![
            rotate(180.0 - SPLIT_COMPLEMENTARY_OFFSET),
            rotate(180.0 + SPLIT_COMPLEMENTARY_OFFSET),
        ],
        HarmonyRule::Tetradic => vec![rotate(angle), rotate(2.0 * angle), rotate(3.0 * angle)],
        HarmonyRule::Monochromatic => {
            let darker = OklabColor::from_lch((lch.l * 0.5).clamp(0.05, 0.95), lch.c * 0.85, lch.h);
            let lighter =
                OklabColor::from_lch((lch.l * 1.3 + 0.1).clamp(0.05, 0.95), lch.c * 0.9, lch.h);
            vec![darker, lighter]
        }
    };

    HarmonicColorSet { colors }
}

/// Like [`generate_harmonics`] but takes a rule name; unknown names use
/// analogous with the supplied angle.
pub fn generate_harmonics_named(
    anchor: OklabColor,
    rule_name: &str,
    angle_degrees: Option<f32>,
) -> HarmonicColorSet {
    let (rule, _) = HarmonyRule::parse_lossy(rule_name);
    generate_harmonics(anchor, rule, angle_degrees)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::hue_distance;

    fn anchor() -> OklabColor {
        OklabColor::new(0.7, 0.05, -0.02)
    }

    #[test]
    fn test_output_counts() {
        let expected = [
            (HarmonyRule::Analogous, 2),
            (HarmonyRule::Complementary, 1),
            (HarmonyRule::Triadic, 2),
            (HarmonyRule::SplitComplementary, 2),
            (HarmonyRule::Tetradic, 3),
            (HarmonyRule::Monochromatic, 2),
        ];
        for (rule, count) in expected {
            assert_eq!(generate_harmonics(anchor(), rule, None).len(), count, "{}", rule);
        }
    }

    #[test]
    fn test_triadic_scenario() {
        let set = generate_harmonics(anchor(), HarmonyRule::Triadic, Some(17.0));
        let base = anchor().to_lch();
        let offsets = [120.0, 240.0];
        for (color, offset) in set.colors().iter().zip(offsets) {
            let lch = color.to_lch();
            assert!((lch.l - base.l).abs() < 1e-6);
            assert!((lch.c - base.c).abs() < 1e-6);
            assert!(hue_distance(lch.h, base.h + offset) < 1e-3);
        }
    }

    #[test]
    fn test_analogous_uses_angle() {
        let set = generate_harmonics(anchor(), HarmonyRule::Analogous, Some(40.0));
        let h = anchor().hue();
        assert!(hue_distance(set.colors()[0].hue(), h + 40.0) < 1e-3);
        assert!(hue_distance(set.colors()[1].hue(), h - 40.0) < 1e-3);
    }

    #[test]
    fn test_split_complementary_ignores_angle() {
        let a = generate_harmonics(anchor(), HarmonyRule::SplitComplementary, Some(10.0));
        let b = generate_harmonics(anchor(), HarmonyRule::SplitComplementary, Some(75.0));
        assert_eq!(a, b);
        let h = anchor().hue();
        assert!(hue_distance(a.colors()[0].hue(), h + 150.0) < 1e-3);
        assert!(hue_distance(a.colors()[1].hue(), h + 210.0) < 1e-3);
    }

    #[test]
    fn test_tetradic_default_square() {
        let set = generate_harmonics(anchor(), HarmonyRule::Tetradic, None);
        let h = anchor().hue();
        for (i, color) in set.colors().iter().enumerate() {
            let expected = h + 90.0 * (i as f32 + 1.0);
            assert!(hue_distance(color.hue(), expected) < 1e-3);
        }
    }

    #[test]
    fn test_monochromatic_variants() {
        let set = generate_harmonics(anchor(), HarmonyRule::Monochromatic, None);
        let [darker, lighter] = [set.colors()[0], set.colors()[1]];
        assert!((darker.l - 0.35).abs() < 1e-6);
        assert!((lighter.l - 0.95).abs() < 1e-6);
        assert!((darker.chroma() - anchor().chroma() * 0.85).abs() < 1e-6);
        assert!((lighter.chroma() - anchor().chroma() * 0.9).abs() < 1e-6);

        let sorted = set.sorted_by_lightness();
        assert!(sorted[0].l < sorted[1].l);
    }

    #[test]
    fn test_complementary_twice_returns_to_anchor_hue() {
        let once = generate_harmonics(anchor(), HarmonyRule::Complementary, None);
        let twice = generate_harmonics(once.colors()[0], HarmonyRule::Complementary, None);
        assert!(hue_distance(twice.colors()[0].hue(), anchor().hue()) < 1e-3);
    }

    #[test]
    fn test_invalid_anchor_yields_empty_set() {
        let set = generate_harmonics(
            OklabColor::new(f32::NAN, 0.0, 0.0),
            HarmonyRule::Triadic,
            None,
        );
        assert!(set.is_empty());
        assert_eq!(set.get_wrapped(3), None);
    }

    #[test]
    fn test_unknown_rule_falls_back_to_analogous() {
        let (rule, fell_back) = HarmonyRule::parse_lossy("pentadic");
        assert_eq!(rule, HarmonyRule::Analogous);
        assert!(fell_back);

        let named = generate_harmonics_named(anchor(), "pentadic", Some(45.0));
        let direct = generate_harmonics(anchor(), HarmonyRule::Analogous, Some(45.0));
        assert_eq!(named, direct);
    }

    #[test]
    fn test_rule_names_roundtrip() {
        for rule in HarmonyRule::ALL {
            assert_eq!(rule.as_str().parse::<HarmonyRule>().unwrap(), rule);
        }
        assert_eq!(
            "Split_Complementary".parse::<HarmonyRule>().unwrap(),
            HarmonyRule::SplitComplementary
        );
    }
}
