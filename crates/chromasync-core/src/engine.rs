//! Per-frame palette engine
//!
//! Wires settings, the reference palette, the current music state and the
//! pulse driver into one styling-variable batch per frame:
//!
//! 1. pick an anchor (manual override, or the extracted color blended with
//!    its best-matching accent, or the theme's default accent)
//! 2. derive harmonics and mix them with the anchor by harmonic intensity
//! 3. apply contextual chroma processing and fade toward the result
//! 4. publish colors, pulse and breathing signals atomically

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::color::transition::DEFAULT_TRANSITION_HALF_LIFE;
use crate::color::{
    oklab_to_rgb_checked, process_oklab_color, ChromaProcessing, ColorContext, ColorTransition,
    OklabColor, Rgb,
};
use crate::harmony::{generate_harmonics, HarmonicColorSet};
use crate::music::ProcessedMusicState;
use crate::palette::{
    blend, find_best_accent, validate, BlendConfig, BlendRatioModulator, ReferencePalette,
    ValidationContext, ValidationReport, ValidationThresholds,
};
use crate::pulse::{BeatPulseDriver, PulseConfig, PulseFrame};
use crate::settings::Settings;
use crate::variables::{ColorRole, VariableBatch, VariableStore};
use crate::CoreError;

/// Palette fade tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionConfig {
    /// Half-life of color fades in seconds; 0 jumps immediately
    pub half_life: f32,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            half_life: DEFAULT_TRANSITION_HALF_LIFE,
        }
    }
}

/// Injected tuning for every engine component
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Accent blending
    pub blend: BlendConfig,
    /// Contrast/harmony thresholds used by [`PaletteEngine::validate`]
    pub thresholds: ValidationThresholds,
    /// Beat pulse
    pub pulse: PulseConfig,
    /// Palette fades
    pub transition: TransitionConfig,
    /// OKLab post-processing; `mood_nudges_enabled` is overridden by settings
    pub chroma: ChromaProcessing,
}

/// Output of one [`PaletteEngine::frame`]
#[derive(Debug, Clone)]
pub struct EngineFrame {
    /// Variables to commit
    pub batch: VariableBatch,
    /// Pulse signals
    pub pulse: PulseFrame,
    /// Color targets were recomputed this frame
    pub refreshed: bool,
    /// At least one published color was gamut-clipped
    pub clipped: bool,
}

/// Frame-driven palette orchestrator. Single-threaded; owns all smoother state.
#[derive(Debug)]
pub struct PaletteEngine {
    config: EngineConfig,
    settings: Settings,
    palette: ReferencePalette,
    music: Option<ProcessedMusicState>,
    extracted: Option<Rgb>,
    modulator: BlendRatioModulator,
    pulse: BeatPulseDriver,
    transitions: [ColorTransition; 3],
    harmonics: Option<HarmonicColorSet>,
    last_refresh_ms: Option<f64>,
    last_frame_ms: Option<f64>,
    dirty: bool,
}

impl PaletteEngine {
    /// Create an engine for `settings`
    pub fn new(settings: Settings, config: EngineConfig) -> Self {
        let half_life = config.transition.half_life;
        let mut modulator = BlendRatioModulator::new(config.blend);
        modulator.update_music(0.5, 0.5);
        Self {
            palette: ReferencePalette::for_theme(settings.theme),
            modulator,
            pulse: BeatPulseDriver::new(config.pulse),
            transitions: [
                ColorTransition::new(half_life),
                ColorTransition::new(half_life),
                ColorTransition::new(half_life),
            ],
            harmonics: None,
            music: None,
            extracted: None,
            last_refresh_ms: None,
            last_frame_ms: None,
            dirty: true,
            settings,
            config,
        }
    }

    /// Active settings
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Active reference palette
    pub fn palette(&self) -> &ReferencePalette {
        &self.palette
    }

    /// Current music state, if any
    pub fn music(&self) -> Option<&ProcessedMusicState> {
        self.music.as_ref()
    }

    /// Replace all settings. Forces a refresh on the next frame.
    pub fn apply_settings(&mut self, settings: Settings) {
        if settings.theme != self.palette.flavor {
            info!("Switching reference palette to {}", settings.theme);
            self.palette = ReferencePalette::for_theme(settings.theme);
        }
        self.settings = settings;
        self.harmonics = None;
        self.dirty = true;
    }

    /// Validated single-key write. Rejected writes leave the engine untouched.
    pub fn set_setting(&mut self, key: &str, value: &str) -> Result<(), CoreError> {
        let mut next = self.settings.clone();
        next.set(key, value)?;
        self.apply_settings(next);
        Ok(())
    }

    /// Color extracted from the host's artwork; `None` clears it
    pub fn set_extracted_color(&mut self, color: Option<Rgb>) {
        if self.extracted == color {
            return;
        }
        self.extracted = color;
        if self.settings.harmonic_evolution {
            self.harmonics = None;
        }
        self.dirty = true;
    }

    /// Adopt a newly processed music state
    pub fn on_music(&mut self, state: ProcessedMusicState) {
        let track_changed = self
            .music
            .as_ref()
            .map(|m| m.track_id != state.track_id)
            .unwrap_or(true);
        if track_changed {
            debug!("Engine adopting track {} ({})", state.track_id, state.mood);
            if self.settings.harmonic_evolution {
                self.harmonics = None;
            }
        }
        self.modulator
            .update_music(state.processed_energy, state.processed_valence);
        self.pulse.set_music(&state);
        self.music = Some(state);
        self.dirty = true;
    }

    /// Drop music context; colors relax to the neutral context
    pub fn clear_music(&mut self) {
        self.music = None;
        self.pulse.clear_music();
        self.modulator.update_music(0.5, 0.5);
        self.dirty = true;
    }

    /// Feed the live energy level to the beat detector
    pub fn observe_energy(&mut self, energy: f32, now_ms: f64) -> bool {
        self.pulse.observe_energy(energy, now_ms)
    }

    /// Validate a color against the active palette and settings
    pub fn validate(&self, color_hex: &str, context: ValidationContext) -> ValidationReport {
        validate(
            color_hex,
            context,
            &self.palette,
            &self.config.thresholds,
            self.settings.expressiveness,
        )
    }

    fn refresh_due(&self, now_ms: f64) -> bool {
        if self.dirty {
            return true;
        }
        match self.last_refresh_ms {
            None => true,
            Some(last) => {
                now_ms - last >= self.settings.performance_quality.color_refresh_interval_ms()
            }
        }
    }

    /// Anchor color before harmonics
    pub fn anchor(&self) -> Rgb {
        if let Some(manual) = self.settings.manual_base_color {
            return manual;
        }
        match self.extracted {
            Some(extracted) => {
                let accent = find_best_accent(extracted, &self.palette, &self.config.blend);
                let ratio = self
                    .modulator
                    .effective_ratio(self.settings.expressiveness.blend_ratio());
                blend(extracted, accent.rgb, ratio, &self.config.blend).rgb
            }
            None => self.palette.default_accent(),
        }
    }

    fn color_context(&self) -> ColorContext {
        match &self.music {
            Some(music) => ColorContext {
                music_energy: Some(music.processed_energy),
                mood: Some(music.mood),
                visual_intensity: Some(music.visual_intensity),
                ..ColorContext::neutral()
            },
            None => ColorContext::neutral(),
        }
    }

    /// Processed target colors in role order
    pub fn target_colors(&mut self) -> [OklabColor; 3] {
        let anchor = OklabColor::from(self.anchor());
        let settings = &self.settings;
        let harmonics = self.harmonics.get_or_insert_with(|| {
            generate_harmonics(anchor, settings.harmony_rule, Some(settings.harmonic_angle))
        });

        let mix = settings.harmonic_intensity.clamp(0.0, 1.0);
        let derived = |index: usize| {
            harmonics
                .get_wrapped(index)
                .map(|h| anchor.lerp(&h, mix))
                .unwrap_or(anchor)
        };
        let raw = [anchor, derived(0), derived(1)];

        let context = self.color_context();
        let chroma = ChromaProcessing {
            mood_nudges_enabled: settings.performance_quality.mood_nudges_enabled(),
            ..self.config.chroma
        };
        raw.map(|c| process_oklab_color(c, &context, &chroma))
    }

    /// Advance one frame and build its variable batch
    pub fn frame(&mut self, now_ms: f64) -> EngineFrame {
        // Repeated timestamps would snap every smoother to its target
        let advance = self.last_frame_ms.map(|last| now_ms > last).unwrap_or(true);
        if advance {
            self.last_frame_ms = Some(now_ms);
            self.modulator.advance_to(now_ms);
        }

        let refreshed = self.refresh_due(now_ms);
        if refreshed {
            let targets = self.target_colors();
            for (transition, target) in self.transitions.iter_mut().zip(targets) {
                transition.set_target(target);
            }
            self.last_refresh_ms = Some(now_ms);
            self.dirty = false;
        }

        let pulse = self.pulse.tick(now_ms);
        let mut batch = VariableBatch::new();
        let mut clipped = false;

        for (role, transition) in ColorRole::ALL.iter().zip(self.transitions.iter_mut()) {
            let color = if advance {
                transition.advance_to(now_ms)
            } else {
                transition.current()
            };
            let (rgb, was_clipped) = oklab_to_rgb_checked(color);
            clipped |= was_clipped;
            batch.set_color(*role, rgb);
            batch.set_oklab(*role, color);
        }

        let visual_intensity = self.music.as_ref().map(|m| m.visual_intensity).unwrap_or(0.0);
        batch.set_number("pulse-intensity", pulse.pulse_intensity);
        batch.set_number("breathing-scale", pulse.breathing_scale);
        batch.set_number("visual-intensity", visual_intensity);
        batch.set_number("blend-multiplier", self.modulator.multiplier());
        batch.set(
            "mood",
            self.music
                .as_ref()
                .map(|m| m.mood.as_str())
                .unwrap_or("none"),
        );
        batch.set("harmony-rule", self.settings.harmony_rule.as_str());

        EngineFrame {
            batch,
            pulse,
            refreshed,
            clipped,
        }
    }

    /// Run [`Self::frame`] and commit its batch to `store`
    pub fn publish_frame<S: VariableStore + ?Sized>(
        &mut self,
        now_ms: f64,
        store: &S,
    ) -> PulseFrame {
        let frame = self.frame(now_ms);
        store.commit(frame.batch);
        frame.pulse
    }
}

impl Default for PaletteEngine {
    fn default() -> Self {
        Self::new(Settings::default(), EngineConfig::default())
    }
}
