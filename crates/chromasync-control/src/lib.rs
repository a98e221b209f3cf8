//! ChromaSync Control - Music Feature Analysis Service
//!
//! The asynchronous boundary between the host media player and the frame-driven
//! palette engine:
//! - **Host**: the [`FeatureSource`] trait the player integration implements
//! - **Fetch**: bounded retry with exponential backoff and safe-default fallback
//! - **Cache**: per-track TTL cache with size bound and statistics
//! - **Subscribers**: typed fan-out with drop-to-unsubscribe handles
//! - **Service**: debounced track-change handling and teardown
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chromasync_control::{AnalysisConfig, AnalysisService, StaticFeatureSource};
//! use std::sync::Arc;
//!
//! # async fn run() -> chromasync_control::Result<()> {
//! let source = Arc::new(StaticFeatureSource::new());
//! let service = AnalysisService::spawn(source, AnalysisConfig::default());
//! let handle = service.handle();
//! let mut updates = handle.subscribe().await?;
//! handle.track_changed("spotify:track:42").await?;
//! if let Some(update) = updates.recv().await {
//!     println!("mood: {}", update.state.mood);
//! }
//! service.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

/// Error types
pub mod error;
/// Bounded-retry fetching
pub mod fetch;
/// Host platform boundary
pub mod host;

/// TTL cache
pub mod cache;
/// Analysis service task
pub mod service;
/// Update fan-out
pub mod subscribers;

// Re-exports
pub use cache::{CacheStats, TtlCache};
pub use error::{ControlError, Result};
pub use fetch::{fetch_with_retry, FetchOutcome, RetryPolicy};
pub use host::{FeatureSource, StaticFeatureSource};
pub use service::{AnalysisConfig, AnalysisHandle, AnalysisService, ServiceStats};
pub use subscribers::{MusicUpdate, SubscriberId, SubscriberList, Subscription, UpdateSource};
