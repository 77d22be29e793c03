//! Local Memory Cache - In-Process Backend
//!
//! Per-process in-memory cache using Moka, with per-key TTL and a bounded
//! number of entries.

use anyhow::Result;
use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::key::KeyParams;
use crate::traits::{CacheBackend, CacheParams};

/// Default `MAX_ENTRIES`
pub const DEFAULT_MAX_ENTRIES: u64 = 300;

/// Cache entry with TTL information
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Arc<Vec<u8>>,
    /// `None` when the TTL reaches past what `Instant` can represent
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: &[u8], ttl: Duration) -> Self {
        Self {
            value: Arc::new(value.to_vec()),
            expires_at: Instant::now().checked_add(ttl),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() > at)
    }
}

/// Moka-backed local memory cache
///
/// **Options**:
/// - `TIMEOUT` - default entry lifetime in seconds (300)
/// - `MAX_ENTRIES` - capacity before eviction (300)
pub struct LocMemCache {
    /// Moka cache instance
    cache: Cache<String, CacheEntry>,
    /// Location name (informational only)
    location: String,
    key: KeyParams,
    timeout: Duration,
    /// Hit counter
    hits: AtomicU64,
    /// Miss counter
    misses: AtomicU64,
}

impl LocMemCache {
    /// Create new local memory cache
    #[must_use]
    pub fn new(name: &str, params: &CacheParams) -> Self {
        let max_entries = params.option_u64("max_entries").unwrap_or(DEFAULT_MAX_ENTRIES);
        let cache = Cache::builder().max_capacity(max_entries).build();

        info!(location = %name, max_entries, "LocMem Cache initialized");

        Self {
            cache,
            location: name.to_string(),
            key: params.key.clone(),
            timeout: params.timeout(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Constructor registered with the module loader
    ///
    /// # Errors
    ///
    /// Never fails; the signature matches [`BackendBuilder`](crate::traits::BackendBuilder).
    pub fn build(name: &str, params: CacheParams) -> Result<Arc<dyn CacheBackend>> {
        Ok(Arc::new(Self::new(name, &params)))
    }

    /// Location name this cache was created with
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// (hits, misses) since creation
    #[must_use]
    pub fn stats(&self) -> (u64, u64) {
        (self.hits.load(Ordering::Relaxed), self.misses.load(Ordering::Relaxed))
    }
}

#[async_trait::async_trait]
impl CacheBackend for LocMemCache {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let key = self.key.make_key(key);
        if let Some(entry) = self.cache.get(&key).await {
            if entry.is_expired() {
                self.cache.remove(&key).await;
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            } else {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.to_vec())
            }
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let key = self.key.make_key(key);
        debug!(key = %key, ttl_secs = %ttl.as_secs(), "[LocMem] Cached key with TTL");
        self.cache.insert(key, CacheEntry::new(value, ttl)).await;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.cache.remove(&self.key.make_key(key)).await;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.cache.invalidate_all();
        Ok(())
    }

    async fn health_check(&self) -> bool {
        let test_key = "health_check_locmem";
        let test_value = b"health_check_value";

        match self.set_with_ttl(test_key, test_value, Duration::from_secs(60)).await {
            Ok(()) => match self.get(test_key).await {
                Some(retrieved) => {
                    let _ = self.remove(test_key).await;
                    retrieved == test_value
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    fn name(&self) -> &'static str {
        "LocMem"
    }

    fn default_timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_remove() {
        let cache = LocMemCache::new("", &CacheParams::default());
        cache.set("user:1", b"alice").await.unwrap();
        assert_eq!(cache.get("user:1").await, Some(b"alice".to_vec()));

        cache.remove("user:1").await.unwrap();
        assert_eq!(cache.get("user:1").await, None);
        assert_eq!(cache.stats(), (1, 1));
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let cache = LocMemCache::new("", &CacheParams::default());
        cache
            .set_with_ttl("short", b"v", Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.get("short").await, None);
    }

    #[tokio::test]
    async fn test_clear_drops_everything() {
        let cache = LocMemCache::new("", &CacheParams::default());
        cache.set("a", b"1").await.unwrap();
        cache.set("b", b"2").await.unwrap();
        cache.clear().await.unwrap();
        assert_eq!(cache.get("a").await, None);
        assert_eq!(cache.get("b").await, None);
    }

    #[tokio::test]
    async fn test_huge_timeout_never_expires() {
        let mut params = CacheParams::default();
        params.options.insert("TIMEOUT".to_string(), json!(u64::MAX));
        let cache = LocMemCache::new("", &params);
        assert_eq!(cache.default_timeout(), Duration::from_secs(u64::MAX));

        cache.set("k", b"v").await.unwrap();
        assert_eq!(cache.get("k").await, Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn test_timeout_option() {
        let mut params = CacheParams::default();
        params.options.insert("timeout".to_string(), json!("30"));
        let cache = LocMemCache::new("", &params);
        assert_eq!(cache.default_timeout(), Duration::from_secs(30));
        assert!(cache.health_check().await);
    }
}
