//! Typed fan-out of processed music updates
//!
//! Every subscriber reads from one bounded broadcast channel. Dropping the
//! [`Subscription`] is the unsubscribe. A subscriber that falls more than the
//! buffer behind loses the oldest updates and resumes with the newest ones,
//! so it never gets stuck on stale music state.

use chromasync_core::ProcessedMusicState;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{debug, warn};

/// Why an update was published
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateSource {
    /// Fetched from the host and processed
    Fetched,
    /// Served from the cache
    Cache,
    /// Host failed; safe defaults were processed
    Fallback,
}

/// One published update
#[derive(Debug, Clone)]
pub struct MusicUpdate {
    /// Processed state, shared between subscribers
    pub state: Arc<ProcessedMusicState>,
    /// Where the state came from
    pub source: UpdateSource,
    /// Produced by a forced refresh rather than a debounced track change
    pub forced: bool,
}

/// Identifier of a subscriber
pub type SubscriberId = u64;

/// Receiving end of a subscription
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: broadcast::Receiver<MusicUpdate>,
}

impl Subscription {
    /// Subscriber id
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next update; `None` once the service is gone
    pub async fn recv(&mut self) -> Option<MusicUpdate> {
        loop {
            match self.receiver.recv().await {
                Ok(update) => return Some(update),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Subscriber {} lagged, skipped {} stale updates", self.id, skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next update if one is queued
    pub fn try_recv(&mut self) -> Option<MusicUpdate> {
        loop {
            match self.receiver.try_recv() {
                Ok(update) => return Some(update),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Subscriber {} lagged, skipped {} stale updates", self.id, skipped);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Drain everything queued
    pub fn drain(&mut self) -> Vec<MusicUpdate> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Stop receiving. Equivalent to dropping.
    pub fn unsubscribe(self) {}
}

/// Live subscriber list
#[derive(Debug)]
pub struct SubscriberList {
    next_id: SubscriberId,
    sender: broadcast::Sender<MusicUpdate>,
}

impl SubscriberList {
    /// Create a list that buffers `buffer` updates for slow subscribers
    pub fn new(buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer.max(1));
        Self { next_id: 0, sender }
    }

    /// Register a new subscriber. It sees updates published from now on.
    pub fn subscribe(&mut self) -> Subscription {
        let id = self.next_id;
        self.next_id += 1;
        debug!("Subscriber {} added", id);
        Subscription {
            id,
            receiver: self.sender.subscribe(),
        }
    }

    /// Deliver `update` to every live subscriber. Returns how many there were.
    pub fn publish(&self, update: &MusicUpdate) -> usize {
        // Err only means nobody is listening
        self.sender.send(update.clone()).unwrap_or(0)
    }

    /// Live subscribers
    pub fn len(&self) -> usize {
        self.sender.receiver_count()
    }

    /// True when nobody is subscribed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chromasync_core::FeatureProcessor;

    fn update(track_id: &str) -> MusicUpdate {
        MusicUpdate {
            state: Arc::new(FeatureProcessor::default().process_fallback(track_id, 0)),
            source: UpdateSource::Fallback,
            forced: false,
        }
    }

    #[test]
    fn test_fan_out_in_order() {
        let mut list = SubscriberList::new(8);
        let mut a = list.subscribe();
        let mut b = list.subscribe();
        assert_ne!(a.id(), b.id());

        assert_eq!(list.publish(&update("1")), 2);
        assert_eq!(list.publish(&update("2")), 2);
        for sub in [&mut a, &mut b] {
            let ids: Vec<String> = sub.drain().iter().map(|u| u.state.track_id.clone()).collect();
            assert_eq!(ids, vec!["1".to_string(), "2".to_string()]);
        }
    }

    #[test]
    fn test_dropped_subscriber_is_removed() {
        let mut list = SubscriberList::new(8);
        let a = list.subscribe();
        let mut b = list.subscribe();
        drop(a);

        assert_eq!(list.publish(&update("t")), 1);
        assert_eq!(list.len(), 1);
        assert!(b.try_recv().is_some());

        b.unsubscribe();
        assert!(list.is_empty());
        assert_eq!(list.publish(&update("t")), 0);
    }

    #[test]
    fn test_lagging_subscriber_keeps_newest_updates() {
        let mut list = SubscriberList::new(2);
        let mut slow = list.subscribe();
        for i in 0..5 {
            list.publish(&update(&format!("t{}", i)));
        }

        let ids: Vec<String> = slow.drain().iter().map(|u| u.state.track_id.clone()).collect();
        assert_eq!(ids, vec!["t3".to_string(), "t4".to_string()]);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_closed_list_ends_subscription() {
        let mut list = SubscriberList::new(4);
        let mut sub = list.subscribe();
        list.publish(&update("last"));
        drop(list);

        assert!(sub.try_recv().is_some());
        assert!(sub.try_recv().is_none());
    }
}
