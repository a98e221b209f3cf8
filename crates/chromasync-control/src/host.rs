//! Host platform boundary
//!
//! The media player is an external collaborator. [`FeatureSource`] is the
//! only thing the analysis service needs from it.

use async_trait::async_trait;
use chromasync_core::RawAudioFeatures;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{ControlError, Result};

/// Source of per-track audio features.
///
/// Implementations may perform network or IPC calls and may fail; the caller
/// owns retry policy.
#[async_trait]
pub trait FeatureSource: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Fetch the features of `track_id`. Missing fields are allowed.
    async fn get_current_audio_features(&self, track_id: &str) -> Result<RawAudioFeatures>;
}

/// In-memory feature table, used by the simulator and in tests.
///
/// Can be told to fail a number of calls before answering.
#[derive(Debug, Default)]
pub struct StaticFeatureSource {
    tracks: RwLock<HashMap<String, RawAudioFeatures>>,
    failures_remaining: AtomicUsize,
    calls: AtomicUsize,
}

impl StaticFeatureSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON object mapping track ids to feature payloads
    pub fn from_json(json: &str) -> Result<Self> {
        let tracks: HashMap<String, RawAudioFeatures> = serde_json::from_str(json)?;
        Ok(Self {
            tracks: RwLock::new(tracks),
            ..Self::default()
        })
    }

    /// Add or replace a track
    pub fn with_track(self, track_id: impl Into<String>, features: RawAudioFeatures) -> Self {
        self.insert(track_id, features);
        self
    }

    /// Fail the next `count` calls
    pub fn with_failures(self, count: usize) -> Self {
        self.failures_remaining.store(count, Ordering::SeqCst);
        self
    }

    /// Add or replace a track
    pub fn insert(&self, track_id: impl Into<String>, features: RawAudioFeatures) {
        self.tracks.write().insert(track_id.into(), features);
    }

    /// Known track ids
    pub fn track_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tracks.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Total calls received, including failed ones
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeatureSource for StaticFeatureSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn get_current_audio_features(&self, track_id: &str) -> Result<RawAudioFeatures> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let should_fail = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(ControlError::HostUnavailable(
                "simulated host failure".to_string(),
            ));
        }

        self.tracks
            .read()
            .get(track_id)
            .cloned()
            .ok_or_else(|| ControlError::FeatureFetch(format!("no features for {}", track_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(energy: f32) -> RawAudioFeatures {
        RawAudioFeatures {
            energy: Some(energy),
            valence: Some(0.5),
            danceability: Some(0.5),
            tempo_bpm: Some(128.0),
            duration_ms: Some(1000),
        }
    }

    #[tokio::test]
    async fn test_static_source_answers() {
        let source = StaticFeatureSource::new().with_track("a", features(0.4));
        let got = source.get_current_audio_features("a").await.unwrap();
        assert_eq!(got.energy, Some(0.4));
        assert!(source.get_current_audio_features("missing").await.is_err());
        assert_eq!(source.call_count(), 2);
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let source = StaticFeatureSource::new()
            .with_track("a", features(0.4))
            .with_failures(2);
        assert!(source.get_current_audio_features("a").await.is_err());
        assert!(source.get_current_audio_features("a").await.is_err());
        assert!(source.get_current_audio_features("a").await.is_ok());
    }

    #[tokio::test]
    async fn test_insert_after_construction_is_served() {
        let source = StaticFeatureSource::new();
        assert!(source.get_current_audio_features("late").await.is_err());
        source.insert("late", features(0.9));
        source.insert("late", features(0.6));
        let got = source.get_current_audio_features("late").await.unwrap();
        assert_eq!(got.energy, Some(0.6));
        assert_eq!(source.track_ids(), vec!["late".to_string()]);
    }

    #[test]
    fn test_from_json_accepts_partial_payloads() {
        let json = r#"{
            "intro": { "energy": 0.2, "tempo": 90.0 },
            "drop": { "energy": 0.95, "valence": 0.8, "danceability": 0.9, "tempo_bpm": 128.0 }
        }"#;
        let source = StaticFeatureSource::from_json(json).unwrap();
        assert_eq!(source.track_ids(), vec!["drop".to_string(), "intro".to_string()]);
        assert!(StaticFeatureSource::from_json("[1, 2]").is_err());
    }
}
