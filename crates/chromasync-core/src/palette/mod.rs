//! Reference palettes, harmony validation and accent blending
//!
//! A theme-scoped reference palette is a closed set of 14 named accents plus
//! a handful of neutrals. It is read-only at runtime: blending selects among
//! its entries, it never creates new ones.

pub mod blend;
pub mod validator;

pub use blend::{
    blend, find_best_accent, AccentMatch, BlendConfig, BlendRatioModulator, BlendedColor,
};
pub use validator::{
    harmony_score, validate, ContextThresholds, ValidationContext, ValidationReport,
    ValidationThresholds,
};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::color::Rgb;
use crate::CoreError;

/// Accent used whenever a palette yields no usable entry
pub const DEFAULT_ACCENT: Rgb = Rgb::new(0xcb, 0xa6, 0xf7);

/// Name of the default accent
pub const DEFAULT_ACCENT_NAME: &str = "mauve";

/// Which reference theme is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeFlavor {
    /// Dark theme
    #[default]
    Mocha,
    /// Light theme
    Latte,
}

impl ThemeFlavor {
    /// Settings value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mocha => "mocha",
            Self::Latte => "latte",
        }
    }
}

impl FromStr for ThemeFlavor {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mocha" => Ok(Self::Mocha),
            "latte" => Ok(Self::Latte),
            _ => Err(CoreError::InvalidSetting {
                key: "theme".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ThemeFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named reference color
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteEntry {
    /// Accent name
    pub name: String,
    /// sRGB hex
    pub hex: String,
}

impl PaletteEntry {
    /// Construct an entry
    pub fn new(name: impl Into<String>, hex: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hex: hex.into(),
        }
    }

    /// Parsed color, `None` when the hex is malformed
    pub fn rgb(&self) -> Option<Rgb> {
        Rgb::from_hex(&self.hex).ok()
    }
}

/// Background and text references used as contrast baselines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neutrals {
    /// Main background
    pub base: Rgb,
    /// Secondary background
    pub mantle: Rgb,
    /// Deepest background
    pub crust: Rgb,
    /// Raised surface
    pub surface: Rgb,
    /// Body text
    pub text: Rgb,
}

/// A theme's accent set plus neutrals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePalette {
    /// Theme this palette belongs to
    pub flavor: ThemeFlavor,
    /// Named accents
    pub accents: Vec<PaletteEntry>,
    /// Neutral references
    pub neutrals: Neutrals,
}

const MOCHA_ACCENTS: [(&str, &str); 14] = [
    ("rosewater", "#f5e0dc"),
    ("flamingo", "#f2cdcd"),
    ("pink", "#f5c2e7"),
    ("mauve", "#cba6f7"),
    ("red", "#f38ba8"),
    ("maroon", "#eba0ac"),
    ("peach", "#fab387"),
    ("yellow", "#f9e2af"),
    ("green", "#a6e3a1"),
    ("teal", "#94e2d5"),
    ("sky", "#89dceb"),
    ("sapphire", "#74c7ec"),
    ("blue", "#89b4fa"),
    ("lavender", "#b4befe"),
];

const LATTE_ACCENTS: [(&str, &str); 14] = [
    ("rosewater", "#dc8a78"),
    ("flamingo", "#dd7878"),
    ("pink", "#ea76cb"),
    ("mauve", "#8839ef"),
    ("red", "#d20f39"),
    ("maroon", "#e64553"),
    ("peach", "#fe640b"),
    ("yellow", "#df8e1d"),
    ("green", "#40a02b"),
    ("teal", "#179299"),
    ("sky", "#04a5e5"),
    ("sapphire", "#209fb5"),
    ("blue", "#1e66f5"),
    ("lavender", "#7287fd"),
];

const MOCHA_NEUTRALS: Neutrals = Neutrals {
    base: Rgb::new(0x1e, 0x1e, 0x2e),
    mantle: Rgb::new(0x18, 0x18, 0x25),
    crust: Rgb::new(0x11, 0x11, 0x1b),
    surface: Rgb::new(0x31, 0x32, 0x44),
    text: Rgb::new(0xcd, 0xd6, 0xf4),
};

const LATTE_NEUTRALS: Neutrals = Neutrals {
    base: Rgb::new(0xef, 0xf1, 0xf5),
    mantle: Rgb::new(0xe6, 0xe9, 0xef),
    crust: Rgb::new(0xdc, 0xe0, 0xe8),
    surface: Rgb::new(0xcc, 0xd0, 0xda),
    text: Rgb::new(0x4c, 0x4f, 0x69),
};

impl ReferencePalette {
    /// Built-in palette for a theme
    pub fn for_theme(flavor: ThemeFlavor) -> Self {
        let (accents, neutrals) = match flavor {
            ThemeFlavor::Mocha => (&MOCHA_ACCENTS, MOCHA_NEUTRALS),
            ThemeFlavor::Latte => (&LATTE_ACCENTS, LATTE_NEUTRALS),
        };
        Self {
            flavor,
            accents: accents
                .iter()
                .map(|(name, hex)| PaletteEntry::new(*name, *hex))
                .collect(),
            neutrals,
        }
    }

    /// Accent by name
    pub fn accent(&self, name: &str) -> Option<&PaletteEntry> {
        self.accents.iter().find(|e| e.name == name)
    }

    /// Parsed accents, skipping malformed entries
    pub fn valid_accents(&self) -> impl Iterator<Item = (&PaletteEntry, Rgb)> {
        self.accents.iter().filter_map(|e| e.rgb().map(|rgb| (e, rgb)))
    }

    /// The theme's default accent, or [`DEFAULT_ACCENT`] when missing/malformed
    pub fn default_accent(&self) -> Rgb {
        self.accent(DEFAULT_ACCENT_NAME)
            .and_then(PaletteEntry::rgb)
            .unwrap_or(DEFAULT_ACCENT)
    }

    /// Background used as the contrast baseline
    pub fn background(&self) -> Rgb {
        self.neutrals.base
    }
}

impl Default for ReferencePalette {
    fn default() -> Self {
        Self::for_theme(ThemeFlavor::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_palettes_are_well_formed() {
        for flavor in [ThemeFlavor::Mocha, ThemeFlavor::Latte] {
            let palette = ReferencePalette::for_theme(flavor);
            assert_eq!(palette.accents.len(), 14);
            assert_eq!(palette.valid_accents().count(), 14);
            assert!(palette.accent("mauve").is_some());
        }
    }

    #[test]
    fn test_default_accent_fallback() {
        let mut palette = ReferencePalette::default();
        assert_eq!(palette.default_accent(), DEFAULT_ACCENT);

        palette.accents.clear();
        assert_eq!(palette.default_accent(), DEFAULT_ACCENT);

        let latte = ReferencePalette::for_theme(ThemeFlavor::Latte);
        assert_eq!(latte.default_accent(), Rgb::new(0x88, 0x39, 0xef));
    }

    #[test]
    fn test_backgrounds_differ_by_theme() {
        let mocha = ReferencePalette::for_theme(ThemeFlavor::Mocha);
        let latte = ReferencePalette::for_theme(ThemeFlavor::Latte);
        assert!(mocha.background().relative_luminance() < 0.05);
        assert!(latte.background().relative_luminance() > 0.8);
    }
}
