//! Two-tier cache subsystem.
//!
//! # Data Flow
//! ```text
//! get(key):
//!     → local.rs (bounded LRU, fixed TTL, no I/O)
//!     → on miss: remote.rs (shared tier, caller TTL)
//!     → on remote hit: optionally promote into local
//!
//! set(key, value, ttl):
//!     → local.rs with the fixed local TTL
//!     → remote.rs with the caller's TTL
//! ```
//!
//! # Design Decisions
//! - Keys are namespaced (`render:` / `fetch:`) so pipelines never collide
//! - Remote failures degrade to a miss; a request never fails on the cache
//! - Concurrent misses on one key are not collapsed; duplicate work is possible
//! - The local tier is instance-private and may diverge within its TTL

pub mod local;
pub mod remote;

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;

pub use local::LocalCache;
pub use remote::{CacheError, CacheResult, MemoryRemoteCache, RedisCache, RemoteCache};

use crate::config::CacheConfig;

/// Namespaced cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key of a rendered page.
    pub fn render(url: &str) -> Self {
        Self(format!("render:{}", url))
    }

    /// Key of a fetched and decoded page.
    pub fn fetch(url: &str) -> Self {
        Self(format!("fetch:{}", url))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Local tier in front of the shared remote tier.
pub struct CacheTier {
    local: LocalCache,
    remote: Arc<dyn RemoteCache>,
    promote_remote_hits: bool,
}

impl CacheTier {
    pub fn new(local: LocalCache, remote: Arc<dyn RemoteCache>, promote_remote_hits: bool) -> Self {
        Self {
            local,
            remote,
            promote_remote_hits,
        }
    }

    /// Build the tier described by `config` around an already connected remote.
    pub fn from_config(config: &CacheConfig, remote: Arc<dyn RemoteCache>) -> Self {
        let capacity = NonZeroUsize::new(config.local_capacity).unwrap_or(NonZeroUsize::MIN);
        let local = LocalCache::new(capacity, Duration::from_secs(config.local_ttl_secs));
        Self::new(local, remote, config.promote_remote_hits)
    }

    pub async fn get(&self, key: &CacheKey) -> Option<Bytes> {
        if let Some(value) = self.local.get(key.as_str()) {
            tracing::trace!(key = %key, "Local cache hit");
            return Some(value);
        }

        match self.remote.get(key.as_str()).await {
            Ok(Some(value)) => {
                tracing::debug!(key = %key, promote = self.promote_remote_hits, "Remote cache hit");
                if self.promote_remote_hits {
                    self.local.insert(key.as_str(), value.clone());
                }
                Some(value)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Remote cache lookup failed, treating as miss");
                None
            }
        }
    }

    pub async fn set(&self, key: &CacheKey, value: Bytes, ttl: Duration) {
        self.local.insert(key.as_str(), value.clone());
        if let Err(e) = self.remote.set(key.as_str(), value, ttl).await {
            tracing::warn!(key = %key, error = %e, "Remote cache write failed");
        }
    }

    pub fn local(&self) -> &LocalCache {
        &self.local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Remote tier recording every call.
    #[derive(Default)]
    struct RecordingRemote {
        inner: MemoryRemoteCache,
        gets: AtomicUsize,
        ttls: Mutex<Vec<Duration>>,
        fail: bool,
    }

    #[async_trait]
    impl RemoteCache for RecordingRemote {
        async fn get(&self, key: &str) -> CacheResult<Option<Bytes>> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(redis::RedisError::from((redis::ErrorKind::IoError, "down")).into());
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> CacheResult<()> {
            self.ttls.lock().unwrap().push(ttl);
            if self.fail {
                return Err(redis::RedisError::from((redis::ErrorKind::IoError, "down")).into());
            }
            self.inner.set(key, value, ttl).await
        }
    }

    fn tier(remote: Arc<RecordingRemote>, promote: bool) -> CacheTier {
        let local = LocalCache::new(NonZeroUsize::new(8).unwrap(), Duration::from_secs(120));
        CacheTier::new(local, remote, promote)
    }

    #[test]
    fn keys_are_namespaced() {
        let url = "https://example.com";
        assert_eq!(CacheKey::render(url).as_str(), "render:https://example.com");
        assert_eq!(CacheKey::fetch(url).as_str(), "fetch:https://example.com");
        assert_ne!(CacheKey::render(url), CacheKey::fetch(url));
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let remote = Arc::new(RecordingRemote::default());
        let cache = tier(remote.clone(), true);
        let key = CacheKey::render("https://example.com");

        cache.set(&key, Bytes::from_static(b"<html></html>"), Duration::from_secs(30)).await;

        assert_eq!(cache.get(&key).await, Some(Bytes::from_static(b"<html></html>")));
        // Served from the local tier without touching the remote.
        assert_eq!(remote.gets.load(Ordering::SeqCst), 0);
        // Remote receives the caller TTL, local keeps its own.
        assert_eq!(*remote.ttls.lock().unwrap(), vec![Duration::from_secs(30)]);
        assert_eq!(cache.local().ttl(), Duration::from_secs(120));
    }

    #[tokio::test]
    async fn remote_hit_promotes_when_enabled() {
        let remote = Arc::new(RecordingRemote::default());
        let key = CacheKey::fetch("https://example.com/page");
        remote
            .inner
            .set(key.as_str(), Bytes::from_static(b"shared"), Duration::from_secs(60))
            .await
            .unwrap();

        let cache = tier(remote.clone(), true);
        assert_eq!(cache.get(&key).await, Some(Bytes::from_static(b"shared")));
        assert_eq!(cache.get(&key).await, Some(Bytes::from_static(b"shared")));

        assert_eq!(remote.gets.load(Ordering::SeqCst), 1);
        assert_eq!(cache.local().len(), 1);
    }

    #[tokio::test]
    async fn remote_hit_stays_remote_when_disabled() {
        let remote = Arc::new(RecordingRemote::default());
        let key = CacheKey::fetch("https://example.com/page");
        remote
            .inner
            .set(key.as_str(), Bytes::from_static(b"shared"), Duration::from_secs(60))
            .await
            .unwrap();

        let cache = tier(remote.clone(), false);
        assert_eq!(cache.get(&key).await, Some(Bytes::from_static(b"shared")));
        assert_eq!(cache.get(&key).await, Some(Bytes::from_static(b"shared")));

        assert_eq!(remote.gets.load(Ordering::SeqCst), 2);
        assert!(cache.local().is_empty());
    }

    #[tokio::test]
    async fn remote_failures_degrade_to_miss() {
        let remote = Arc::new(RecordingRemote {
            fail: true,
            ..Default::default()
        });
        let cache = tier(remote, true);
        let key = CacheKey::render("https://example.com");

        assert_eq!(cache.get(&key).await, None);

        // The local tier still accepts the write.
        cache.set(&key, Bytes::from_static(b"page"), Duration::from_secs(30)).await;
        assert_eq!(cache.get(&key).await, Some(Bytes::from_static(b"page")));
    }
}
