//! Simulated media host
//!
//! Stands in for a real player: a fixed playlist with per-track features,
//! artwork colors and a beat-synchronous energy signal. Feature lookups take
//! a configurable round-trip and an occasional call fails, so the retry path
//! runs in normal use.

use async_trait::async_trait;
use chromasync_control::{ControlError, FeatureSource};
use chromasync_core::{RawAudioFeatures, Rgb};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::trace;

/// Tempo assumed for the energy signal when a track has none
const SIGNAL_FALLBACK_BPM: f32 = 120.0;

/// Fraction of each beat spent at peak energy
const BEAT_ON_FRACTION: f64 = 0.15;

/// One playlist entry
#[derive(Debug, Clone)]
pub struct SimulatedTrack {
    /// Host track id
    pub id: &'static str,
    /// Display title
    pub title: &'static str,
    /// Features the host reports; fields may be missing
    pub features: RawAudioFeatures,
    /// Dominant artwork color, if the host extracted one
    pub artwork: Option<&'static str>,
}

impl SimulatedTrack {
    /// Artwork color
    pub fn artwork_color(&self) -> Option<Rgb> {
        self.artwork.and_then(|hex| Rgb::from_hex(hex).ok())
    }

    /// Instantaneous energy `elapsed_ms` into the track.
    ///
    /// A square-ish wave: a short peak at every beat over a floor derived from
    /// the track energy.
    pub fn energy_at(&self, elapsed_ms: f64) -> f32 {
        let bpm = self
            .features
            .tempo_bpm
            .filter(|bpm| *bpm > 0.0)
            .unwrap_or(SIGNAL_FALLBACK_BPM);
        let beat_ms = 60_000.0 / f64::from(bpm);
        let phase = (elapsed_ms.max(0.0) % beat_ms) / beat_ms;
        let level = self.features.energy.unwrap_or(0.5);
        if phase < BEAT_ON_FRACTION {
            0.7 + 0.3 * level
        } else {
            0.4 * level
        }
    }
}

fn features(
    energy: Option<f32>,
    valence: Option<f32>,
    danceability: Option<f32>,
    tempo_bpm: Option<f32>,
) -> RawAudioFeatures {
    RawAudioFeatures {
        energy,
        valence,
        danceability,
        tempo_bpm,
        duration_ms: Some(210_000),
    }
}

/// Built-in playlist, covering every mood and one partial payload
pub fn default_playlist() -> Vec<SimulatedTrack> {
    vec![
        SimulatedTrack {
            id: "sim:sunrise-run",
            title: "Sunrise Run",
            features: features(Some(0.85), Some(0.8), Some(0.78), Some(128.0)),
            artwork: Some("#f5a97f"),
        },
        SimulatedTrack {
            id: "sim:night-drive",
            title: "Night Drive",
            features: features(Some(0.82), Some(0.2), Some(0.55), Some(140.0)),
            artwork: Some("#3b4261"),
        },
        SimulatedTrack {
            id: "sim:rain-letters",
            title: "Rain Letters",
            features: features(Some(0.25), Some(0.18), Some(0.3), Some(72.0)),
            artwork: Some("#7dc4e4"),
        },
        SimulatedTrack {
            id: "sim:porch-swing",
            title: "Porch Swing",
            features: features(Some(0.3), Some(0.75), Some(0.45), Some(96.0)),
            artwork: None,
        },
        SimulatedTrack {
            id: "sim:basement-loop",
            title: "Basement Loop",
            features: features(Some(0.55), Some(0.5), Some(0.9), Some(118.0)),
            artwork: Some("#a6da95"),
        },
        SimulatedTrack {
            id: "sim:field-recording",
            title: "Field Recording",
            features: features(Some(0.4), None, None, None),
            artwork: Some("#eed49f"),
        },
    ]
}

/// [`FeatureSource`] backed by a playlist
#[derive(Debug)]
pub struct SimulatedHost {
    tracks: Vec<SimulatedTrack>,
    latency: Duration,
    fail_every: usize,
    calls: AtomicUsize,
}

impl SimulatedHost {
    /// Host over `tracks`. Every `fail_every`-th call fails; 0 never fails.
    pub fn new(tracks: Vec<SimulatedTrack>, latency: Duration, fail_every: usize) -> Self {
        Self {
            tracks,
            latency,
            fail_every,
            calls: AtomicUsize::new(0),
        }
    }

    /// Playlist
    pub fn tracks(&self) -> &[SimulatedTrack] {
        &self.tracks
    }

    /// Track at playlist position `index`, wrapping around
    pub fn track(&self, index: usize) -> Option<&SimulatedTrack> {
        if self.tracks.is_empty() {
            None
        } else {
            self.tracks.get(index % self.tracks.len())
        }
    }
}

#[async_trait]
impl FeatureSource for SimulatedHost {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn get_current_audio_features(
        &self,
        track_id: &str,
    ) -> chromasync_control::Result<RawAudioFeatures> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.latency).await;

        if self.fail_every > 0 && call % self.fail_every == 0 {
            trace!("Simulated host dropping call {}", call);
            return Err(ControlError::HostUnavailable(
                "simulated timeout".to_string(),
            ));
        }

        self.tracks
            .iter()
            .find(|track| track.id == track_id)
            .map(|track| track.features.clone())
            .ok_or_else(|| ControlError::FeatureFetch(format!("unknown track {}", track_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_host_answers_after_latency() {
        let host = SimulatedHost::new(default_playlist(), Duration::from_millis(40), 0);
        let started = tokio::time::Instant::now();
        let features = host
            .get_current_audio_features("sim:night-drive")
            .await
            .unwrap();
        assert_eq!(features.tempo_bpm, Some(140.0));
        assert!(started.elapsed() >= Duration::from_millis(40));
        assert!(host.get_current_audio_features("nope").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_nth_call_fails() {
        let host = SimulatedHost::new(default_playlist(), Duration::ZERO, 3);
        let id = "sim:sunrise-run";
        assert!(host.get_current_audio_features(id).await.is_ok());
        assert!(host.get_current_audio_features(id).await.is_ok());
        assert!(matches!(
            host.get_current_audio_features(id).await,
            Err(ControlError::HostUnavailable(_))
        ));
        assert!(host.get_current_audio_features(id).await.is_ok());
    }

    #[test]
    fn test_energy_peaks_once_per_beat() {
        let playlist = default_playlist();
        let track = &playlist[0];
        // 128 BPM, sampled at 60 fps for two seconds
        let mut rising_edges = 0;
        let mut above = false;
        for frame in 0..120 {
            let high = track.energy_at(frame as f64 * 1000.0 / 60.0) > 0.65;
            if high && !above {
                rising_edges += 1;
            }
            above = high;
        }
        assert!((4..=5).contains(&rising_edges), "{}", rising_edges);
    }

    #[test]
    fn test_playlist_wraps() {
        let host = SimulatedHost::new(default_playlist(), Duration::ZERO, 0);
        let len = host.tracks().len();
        assert_eq!(host.track(len).map(|t| t.id), host.track(0).map(|t| t.id));
        assert!(SimulatedHost::new(Vec::new(), Duration::ZERO, 0)
            .track(0)
            .is_none());
        assert_eq!(
            default_playlist()[3].artwork_color(),
            None,
            "tracks without artwork leave extraction empty"
        );
    }
}
