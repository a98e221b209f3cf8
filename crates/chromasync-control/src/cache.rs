//! Bounded TTL cache for processed music states
//!
//! The cache is an optimization, not a source of truth: every entry can be
//! re-derived from the host. Expired entries are dropped lazily on lookup and
//! in bulk by [`TtlCache::prune`]; when full, the oldest entry is evicted.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// Counters for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that found nothing fresh
    pub misses: u64,
    /// Entries dropped for capacity
    pub evictions: u64,
    /// Entries dropped for age
    pub expirations: u64,
}

impl CacheStats {
    /// Hits over total lookups, 0 before any lookup
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// String-keyed cache with a time-to-live and a size bound
#[derive(Debug, Clone)]
pub struct TtlCache<V> {
    entries: HashMap<String, CacheEntry<V>>,
    ttl: Duration,
    capacity: usize,
    stats: CacheStats,
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache. A capacity of 0 is raised to 1.
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            capacity: capacity.max(1),
            stats: CacheStats::default(),
        }
    }

    /// Fresh value for `key`
    pub fn get(&mut self, key: &str, now: Instant) -> Option<V> {
        let ttl = self.ttl;
        let expired = match self.entries.get(key) {
            Some(entry) if now.saturating_duration_since(entry.inserted_at) < ttl => {
                let value = entry.value.clone();
                self.stats.hits += 1;
                return Some(value);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove(key);
            self.stats.expirations += 1;
            trace!("Cache entry {} expired", key);
        }
        self.stats.misses += 1;
        None
    }

    /// Insert or replace `key`, evicting the oldest entry when full
    pub fn insert(&mut self, key: impl Into<String>, value: V, now: Instant) {
        let key = key.into();
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.prune(now);
            if self.entries.len() >= self.capacity {
                self.evict_oldest();
            }
        }
        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: now,
            },
        );
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.inserted_at)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
            self.stats.evictions += 1;
            trace!("Cache evicted {}", key);
        }
    }

    /// Drop every expired entry. Idempotent; returns how many were dropped.
    pub fn prune(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.inserted_at) < ttl);
        let dropped = before - self.entries.len();
        self.stats.expirations += dropped as u64;
        dropped
    }

    /// Remove `key`
    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.entries.remove(key).map(|entry| entry.value)
    }

    /// Drop everything. Statistics are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Stored entries, fresh or not
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is stored
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Counters so far
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Configured time-to-live
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Configured capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
