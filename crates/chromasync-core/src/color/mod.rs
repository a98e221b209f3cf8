//! Color science: sRGB/HSL utilities, OKLab transform and smoothed transitions

pub mod oklab;
pub mod rgb;
pub mod transition;

pub use oklab::{
    oklab_to_rgb, oklab_to_rgb_checked, process_oklab_color, rgb_to_oklab, ChromaProcessing,
    ColorContext, OklabColor, Oklch,
};
pub use rgb::{hue_distance, normalize_hue, Hsl, Rgb};
pub use transition::ColorTransition;
