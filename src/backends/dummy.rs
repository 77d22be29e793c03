//! Dummy Cache - No-op Backend
//!
//! Implements the backend interface without caching anything. Useful in
//! development and tests where caching should be switched off without
//! touching call sites.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use crate::traits::{CacheBackend, CacheParams};

/// Cache that stores nothing
#[derive(Debug, Default, Clone)]
pub struct DummyCache;

impl DummyCache {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Constructor registered with the module loader
    ///
    /// # Errors
    ///
    /// Never fails.
    pub fn build(_name: &str, _params: CacheParams) -> Result<Arc<dyn CacheBackend>> {
        Ok(Arc::new(Self::new()))
    }
}

#[async_trait::async_trait]
impl CacheBackend for DummyCache {
    async fn get(&self, _key: &str) -> Option<Vec<u8>> {
        None
    }

    async fn set_with_ttl(&self, _key: &str, _value: &[u8], _ttl: Duration) -> Result<()> {
        Ok(())
    }

    async fn remove(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "Dummy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_nothing_is_stored() {
        let cache = DummyCache::new();
        cache.set("k", b"v").await.unwrap();
        assert_eq!(cache.get("k").await, None);
        assert!(!cache.supports_close());
    }
}
