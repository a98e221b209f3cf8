//! Music feature analysis service
//!
//! A single tokio task owns the cache, the feature processor and the
//! subscriber list; callers talk to it through a cloneable
//! [`AnalysisHandle`]. Because only that task touches the mutable state, no
//! locks are needed.
//!
//! Track-change notifications are debounced (trailing edge): a burst of
//! changes produces one update for the last track. Forced refreshes bypass
//! both the debounce window and the cache. Shutting the service down cancels
//! the pending debounce and any in-flight retry.

use chromasync_core::{ExpressivenessMode, FeatureProcessor, FeatureWeights, ProcessedMusicState};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, TtlCache};
use crate::error::{ControlError, Result};
use crate::fetch::{fetch_with_retry, RetryPolicy};
use crate::host::FeatureSource;
use crate::subscribers::{MusicUpdate, SubscriberList, Subscription, UpdateSource};

/// Analysis service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Lifetime of cached states
    pub cache_ttl: Duration,
    /// Maximum cached tracks
    pub cache_capacity: usize,
    /// Quiet period after the last track change before processing
    pub debounce: Duration,
    /// Interval of the background cache sweep
    pub prune_interval: Duration,
    /// Fetch retry policy
    pub retry: RetryPolicy,
    /// Feature correction weights
    pub weights: FeatureWeights,
    /// Initial expressiveness mode
    pub expressiveness: ExpressivenessMode,
    /// Updates kept for slow subscribers; older ones are dropped first
    pub subscriber_buffer: usize,
    /// Command queue depth
    pub command_buffer: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(5 * 60),
            cache_capacity: 64,
            debounce: Duration::from_millis(200),
            prune_interval: Duration::from_secs(60),
            retry: RetryPolicy::default(),
            weights: FeatureWeights::default(),
            expressiveness: ExpressivenessMode::Default,
            subscriber_buffer: 32,
            command_buffer: 64,
        }
    }
}

enum Command {
    TrackChanged(String),
    Refresh {
        track_id: Option<String>,
        reply: oneshot::Sender<Option<ProcessedMusicState>>,
    },
    Subscribe(oneshot::Sender<Subscription>),
    SetExpressiveness {
        mode: ExpressivenessMode,
        reply: oneshot::Sender<()>,
    },
    Current(oneshot::Sender<Option<ProcessedMusicState>>),
    Stats(oneshot::Sender<ServiceStats>),
}

/// Diagnostics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Cache counters
    pub cache: CacheStats,
    /// Entries currently cached
    pub cached_tracks: usize,
    /// Live subscribers
    pub subscribers: usize,
    /// Updates published so far
    pub published: u64,
    /// Updates that fell back to safe defaults
    pub fallbacks: u64,
}

/// Cloneable client of a running [`AnalysisService`]
#[derive(Debug, Clone)]
pub struct AnalysisHandle {
    commands: mpsc::Sender<Command>,
}

impl AnalysisHandle {
    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ControlError::ServiceStopped)
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.send(build(tx)).await?;
        rx.await.map_err(|_| ControlError::ServiceStopped)
    }

    /// Notify a playback track change (debounced)
    pub async fn track_changed(&self, track_id: impl Into<String>) -> Result<()> {
        let track_id = track_id.into();
        if track_id.trim().is_empty() {
            return Err(ControlError::InvalidParameter(
                "track id must not be empty".to_string(),
            ));
        }
        self.send(Command::TrackChanged(track_id)).await
    }

    /// Process immediately, bypassing debounce and cache.
    ///
    /// With `None`, refreshes the pending track or else the current one.
    pub async fn force_refresh(&self, track_id: Option<&str>) -> Result<ProcessedMusicState> {
        let track_id = track_id.map(str::to_string);
        self.request(|reply| Command::Refresh { track_id, reply })
            .await?
            .ok_or_else(|| ControlError::InvalidParameter("no track to refresh".to_string()))
    }

    /// Receive every future update
    pub async fn subscribe(&self) -> Result<Subscription> {
        self.request(Command::Subscribe).await
    }

    /// Change expressiveness. Drops the cache and re-processes the current track.
    pub async fn set_expressiveness(&self, mode: ExpressivenessMode) -> Result<()> {
        self.request(|reply| Command::SetExpressiveness { mode, reply })
            .await
    }

    /// Most recently published state
    pub async fn current(&self) -> Result<Option<ProcessedMusicState>> {
        self.request(Command::Current).await
    }

    /// Diagnostics
    pub async fn stats(&self) -> Result<ServiceStats> {
        self.request(Command::Stats).await
    }
}

/// Running analysis service. Dropping it tears the task down.
#[derive(Debug)]
pub struct AnalysisService {
    handle: AnalysisHandle,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl AnalysisService {
    /// Spawn the service task on the current tokio runtime
    pub fn spawn(source: Arc<dyn FeatureSource>, config: AnalysisConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.command_buffer.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(
            "Starting analysis service (source: {}, debounce: {:?}, ttl: {:?})",
            source.name(),
            config.debounce,
            config.cache_ttl
        );

        let worker = Worker {
            processor: FeatureProcessor::new(config.weights.clone(), config.expressiveness),
            cache: TtlCache::new(config.cache_ttl, config.cache_capacity),
            subscribers: SubscriberList::new(config.subscriber_buffer),
            pending: None,
            current: None,
            published: 0,
            fallbacks: 0,
            source,
            commands: rx,
            shutdown: shutdown_rx,
            config,
        };

        Self {
            handle: AnalysisHandle { commands: tx },
            shutdown: shutdown_tx,
            task: Some(tokio::spawn(worker.run())),
        }
    }

    /// Client handle
    pub fn handle(&self) -> AnalysisHandle {
        self.handle.clone()
    }

    /// Stop the task, cancelling pending debounce and in-flight retries
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Analysis task ended abnormally: {}", e);
            }
        }
        info!("Analysis service stopped");
    }
}

impl Drop for AnalysisService {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct PendingChange {
    track_id: String,
    deadline: Instant,
}

enum Event {
    Command(Command),
    DebounceElapsed,
    Prune,
    Shutdown,
}

struct Worker {
    config: AnalysisConfig,
    source: Arc<dyn FeatureSource>,
    processor: FeatureProcessor,
    cache: TtlCache<ProcessedMusicState>,
    subscribers: SubscriberList,
    pending: Option<PendingChange>,
    current: Option<ProcessedMusicState>,
    published: u64,
    fallbacks: u64,
    commands: mpsc::Receiver<Command>,
    shutdown: watch::Receiver<bool>,
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl Worker {
    async fn run(mut self) {
        let mut prune = tokio::time::interval(self.config.prune_interval);
        prune.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let deadline = self.pending.as_ref().map(|p| p.deadline);
            let event = tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => Event::Command(command),
                    None => Event::Shutdown,
                },
                _ = sleep_until_deadline(deadline) => Event::DebounceElapsed,
                _ = prune.tick() => Event::Prune,
                _ = self.shutdown.changed() => Event::Shutdown,
            };

            match event {
                Event::Command(command) => {
                    if !self.handle(command).await {
                        break;
                    }
                }
                Event::DebounceElapsed => {
                    if let Some(pending) = self.pending.take() {
                        if self.process(pending.track_id, false).await.is_none() {
                            break;
                        }
                    }
                }
                Event::Prune => {
                    let dropped = self.cache.prune(Instant::now());
                    if dropped > 0 {
                        debug!("Pruned {} expired cache entries", dropped);
                    }
                }
                Event::Shutdown => break,
            }
        }

        if let Some(pending) = self.pending.take() {
            debug!("Dropping pending track change {}", pending.track_id);
        }
    }

    /// Returns false when the service was shut down mid-command
    async fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::TrackChanged(track_id) => {
                debug!("Track change {} (debounced)", track_id);
                self.pending = Some(PendingChange {
                    track_id,
                    deadline: Instant::now() + self.config.debounce,
                });
            }
            Command::Refresh { track_id, reply } => {
                // A refresh of some other track leaves the pending change armed
                let covers_pending = match (&track_id, &self.pending) {
                    (None, _) => true,
                    (Some(id), Some(pending)) => *id == pending.track_id,
                    (Some(_), None) => false,
                };
                let pending = if covers_pending {
                    self.pending.take().map(|p| p.track_id)
                } else {
                    None
                };
                let target = track_id
                    .or(pending)
                    .or_else(|| self.current.as_ref().map(|c| c.track_id.clone()));
                let Some(target) = target else {
                    let _ = reply.send(None);
                    return true;
                };
                match self.process(target, true).await {
                    Some(state) => {
                        let _ = reply.send(Some(state));
                    }
                    None => return false,
                }
            }
            Command::Subscribe(reply) => {
                let _ = reply.send(self.subscribers.subscribe());
            }
            Command::SetExpressiveness { mode, reply } => {
                if mode != self.processor.expressiveness() {
                    info!("Expressiveness set to {}", mode);
                    self.processor.set_expressiveness(mode);
                    self.cache.clear();
                    if let Some(current) = self.current.as_ref().map(|c| c.track_id.clone()) {
                        if self.process(current, true).await.is_none() {
                            return false;
                        }
                    }
                }
                let _ = reply.send(());
            }
            Command::Current(reply) => {
                let _ = reply.send(self.current.clone());
            }
            Command::Stats(reply) => {
                let _ = reply.send(ServiceStats {
                    cache: self.cache.stats(),
                    cached_tracks: self.cache.len(),
                    subscribers: self.subscribers.len(),
                    published: self.published,
                    fallbacks: self.fallbacks,
                });
            }
        }
        true
    }

    /// Produce and publish the state for `track_id`. `None` means shut down.
    async fn process(&mut self, track_id: String, forced: bool) -> Option<ProcessedMusicState> {
        if !forced {
            if let Some(state) = self.cache.get(&track_id, Instant::now()) {
                debug!("Serving {} from cache", track_id);
                self.publish(state.clone(), UpdateSource::Cache, false);
                return Some(state);
            }
        }

        let fetch = fetch_with_retry(self.source.as_ref(), &track_id, &self.config.retry);
        let outcome = tokio::select! {
            outcome = fetch => outcome,
            _ = self.shutdown.changed() => {
                debug!("Fetch for {} cancelled by shutdown", track_id);
                return None;
            }
        };

        let now_ms = unix_millis();
        let (state, source) = if outcome.fell_back {
            self.fallbacks += 1;
            (
                self.processor.process_fallback(&track_id, now_ms),
                UpdateSource::Fallback,
            )
        } else {
            let state = self.processor.process(&outcome.sample, now_ms);
            self.cache.insert(track_id.clone(), state.clone(), Instant::now());
            (state, UpdateSource::Fetched)
        };

        info!(
            "Track {}: mood {}, intensity {:.2}{}",
            track_id,
            state.mood,
            state.visual_intensity,
            if outcome.fell_back { " (fallback)" } else { "" }
        );
        self.publish(state.clone(), source, forced);
        Some(state)
    }

    fn publish(&mut self, state: ProcessedMusicState, source: UpdateSource, forced: bool) {
        self.current = Some(state.clone());
        self.published += 1;
        let update = MusicUpdate {
            state: Arc::new(state),
            source,
            forced,
        };
        self.subscribers.publish(&update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::StaticFeatureSource;
    use chromasync_core::RawAudioFeatures;

    fn features() -> RawAudioFeatures {
        RawAudioFeatures {
            energy: Some(0.8),
            valence: Some(0.7),
            danceability: Some(0.75),
            tempo_bpm: Some(120.0),
            duration_ms: Some(180_000),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_refresh_without_track_is_rejected() {
        let service = AnalysisService::spawn(
            Arc::new(StaticFeatureSource::new()),
            AnalysisConfig::default(),
        );
        let handle = service.handle();
        assert!(matches!(
            handle.force_refresh(None).await,
            Err(ControlError::InvalidParameter(_))
        ));
        assert!(handle.track_changed("  ").await.is_err());
        service.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_current_follows_updates() {
        let source = Arc::new(StaticFeatureSource::new().with_track("a", features()));
        let service = AnalysisService::spawn(source, AnalysisConfig::default());
        let handle = service.handle();
        assert_eq!(handle.current().await.unwrap(), None);

        let state = handle.force_refresh(Some("a")).await.unwrap();
        assert_eq!(state.mood.as_str(), "energetic_happy");
        assert_eq!(handle.current().await.unwrap(), Some(state));
        service.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_reports_stopped_service() {
        let service = AnalysisService::spawn(
            Arc::new(StaticFeatureSource::new()),
            AnalysisConfig::default(),
        );
        let handle = service.handle();
        service.shutdown().await;
        assert!(matches!(
            handle.track_changed("a").await,
            Err(ControlError::ServiceStopped)
        ));
    }
}
