//! Instance-private cache tier.
//!
//! # Responsibilities
//! - Bounded entry count with least-recently-used eviction
//! - Fixed TTL per entry, independent of the caller's TTL
//! - Expired entries are dropped when they are looked up

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use lru::LruCache;

#[derive(Debug)]
struct LocalEntry {
    value: Bytes,
    inserted_at: Instant,
}

/// Thread-safe LRU cache with a single fixed TTL.
#[derive(Debug)]
pub struct LocalCache {
    entries: Mutex<LruCache<String, LocalEntry>>,
    ttl: Duration,
}

impl LocalCache {
    pub fn new(capacity: NonZeroUsize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Look up a fresh entry, refreshing its recency.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        let mut entries = self.lock();
        let (fresh, value) = {
            let entry = entries.get(key)?;
            (entry.inserted_at.elapsed() < self.ttl, entry.value.clone())
        };

        if fresh {
            Some(value)
        } else {
            entries.pop(key);
            None
        }
    }

    /// Insert or overwrite an entry. Last writer wins.
    pub fn insert(&self, key: &str, value: Bytes) {
        self.lock().put(
            key.to_string(),
            LocalEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, LocalEntry>> {
        // Entries hold no invariants a panicking writer could break.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
