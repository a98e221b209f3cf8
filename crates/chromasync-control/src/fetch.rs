//! Bounded-retry feature fetching
//!
//! A fetch never fails from the caller's point of view: once the retry budget
//! is spent, safe default features are substituted and the outcome is tagged.

use chromasync_core::AudioFeatureSample;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::host::FeatureSource;

/// Exponential backoff policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts including the first one
    pub max_attempts: u32,
    /// Delay after the first failure
    pub base_delay: Duration,
    /// Growth of each subsequent delay
    pub backoff_factor: f32,
    /// Upper bound of any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            backoff_factor: 1.5,
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(64) as i32;
        let factor = f64::from(self.backoff_factor.max(1.0)).powi(exponent);
        let micros = self.base_delay.as_micros() as f64 * factor;
        let capped = micros.min(self.max_delay.as_micros() as f64);
        Duration::from_micros(capped as u64)
    }

    /// Sum of every delay a fully failing fetch waits
    pub fn worst_case_wait(&self) -> Duration {
        (1..self.max_attempts.max(1)).map(|a| self.delay_after(a)).sum()
    }
}

/// Result of [`fetch_with_retry`]
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    /// Features to process; safe defaults when `fell_back`
    pub sample: AudioFeatureSample,
    /// Attempts made
    pub attempts: u32,
    /// Every attempt failed or returned nothing usable
    pub fell_back: bool,
    /// Some fields were missing and filled with defaults
    pub partial: bool,
}

/// Fetch features for `track_id`, retrying with backoff.
///
/// Empty payloads count as failures. Partial payloads are accepted and
/// completed with safe defaults.
pub async fn fetch_with_retry(
    source: &dyn FeatureSource,
    track_id: &str,
    policy: &RetryPolicy,
) -> FetchOutcome {
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match source.get_current_audio_features(track_id).await {
            Ok(raw) if !raw.is_empty() => {
                let partial = raw.is_partial();
                if partial {
                    debug!("Partial features for {} from {}", track_id, source.name());
                }
                return FetchOutcome {
                    sample: raw.into_sample(track_id),
                    attempts: attempt,
                    fell_back: false,
                    partial,
                };
            }
            Ok(_) => {
                debug!(
                    "Empty features for {} (attempt {}/{})",
                    track_id, attempt, max_attempts
                );
            }
            Err(e) => {
                debug!(
                    "Feature fetch for {} failed (attempt {}/{}): {}",
                    track_id, attempt, max_attempts, e
                );
            }
        }

        if attempt < max_attempts {
            tokio::time::sleep(policy.delay_after(attempt)).await;
        }
    }

    warn!(
        "Giving up on features for {} after {} attempts, using safe defaults",
        track_id, max_attempts
    );
    FetchOutcome {
        sample: AudioFeatureSample::safe_default(track_id),
        attempts: max_attempts,
        fell_back: true,
        partial: false,
    }
}
