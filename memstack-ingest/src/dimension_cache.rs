//! [`DimensionCache`] — the short-lived "last known good embedding
//! dimension" cache (spec.md §4.7 step 1).

use chrono::{DateTime, Utc};
use std::sync::Mutex;
use std::time::Duration;

struct Entry {
    dimension: usize,
    cached_at: DateTime<Utc>,
}

/// Remembers the embedder dimension last confirmed compatible with the
/// graph, so repeated `add_episode` calls within the TTL skip the
/// dimension probe entirely.
pub struct DimensionCache {
    ttl: Duration,
    entry: Mutex<Option<Entry>>,
}

impl DimensionCache {
    /// Build a cache with the given time-to-live.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
        }
    }

    /// The cached dimension, if one was recorded less than `ttl` ago.
    pub fn get(&self, now: DateTime<Utc>) -> Option<usize> {
        let entry = self.entry.lock().expect("dimension cache lock poisoned");
        entry.as_ref().and_then(|e| {
            let age = now.signed_duration_since(e.cached_at);
            (age.to_std().unwrap_or(Duration::MAX) < self.ttl).then_some(e.dimension)
        })
    }

    /// Record `dimension` as known-good as of `now`.
    pub fn set(&self, dimension: usize, now: DateTime<Utc>) {
        let mut entry = self.entry.lock().expect("dimension cache lock poisoned");
        *entry = Some(Entry {
            dimension,
            cached_at: now,
        });
    }
}
