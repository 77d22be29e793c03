//! Memcached Cache - Distributed Cache Backend
//!
//! Memcached-based distributed cache. The backend name is a `;`-separated
//! server list, e.g. `127.0.0.1:11211;10.0.0.2:11211`.
//!
//! The connection is opened lazily on first use and dropped by `close`, so
//! wiring `close` to the end of every request keeps idle connections from
//! piling up; the next request reconnects.

use anyhow::{Result, anyhow};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::key::KeyParams;
use crate::traits::{CacheBackend, CacheParams};

/// Memcached distributed cache
///
/// **Note**: Memcached cannot report remaining TTL and does not persist to disk.
pub struct MemcachedCache {
    /// `memcache://` URLs, one per server
    servers: Vec<String>,
    /// Lazily connected client; `None` until first use and after `close`
    client: Mutex<Option<Arc<memcache::Client>>>,
    key: KeyParams,
    timeout: Duration,
}

impl MemcachedCache {
    /// Create new Memcached cache for the `;`-separated server list `name`
    ///
    /// No connection is made until the first operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the server list is empty.
    pub fn new(name: &str, params: &CacheParams) -> Result<Self> {
        let servers: Vec<String> = name
            .split(';')
            .map(str::trim)
            .filter(|server| !server.is_empty())
            .map(|server| {
                if server.starts_with("memcache://") {
                    server.to_string()
                } else {
                    format!("memcache://{server}")
                }
            })
            .collect();

        if servers.is_empty() {
            return Err(anyhow!("Memcached cache requires at least one server in its NAME"));
        }

        info!(servers = ?servers, "Memcached Cache configured");

        Ok(Self {
            servers,
            client: Mutex::new(None),
            key: params.key.clone(),
            timeout: params.timeout(),
        })
    }

    /// Constructor registered with the module loader
    ///
    /// # Errors
    ///
    /// See [`MemcachedCache::new`].
    pub fn build(name: &str, params: CacheParams) -> Result<Arc<dyn CacheBackend>> {
        Ok(Arc::new(Self::new(name, &params)?))
    }

    /// Configured server URLs
    #[must_use]
    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    /// Whether a connection is currently open
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.client.lock().is_some()
    }

    /// Connected client, opening the connection on first use
    ///
    /// The lock is held only while connecting; operations run on a clone.
    fn connection(&self) -> Result<Arc<memcache::Client>> {
        let mut guard = self.client.lock();
        if let Some(client) = guard.as_ref() {
            return Ok(Arc::clone(client));
        }
        let client = Arc::new(
            memcache::connect(self.servers.clone())
                .map_err(|e| anyhow!("Failed to connect to Memcached: {e}"))?,
        );
        debug!(servers = ?self.servers, "Memcached connection opened");
        *guard = Some(Arc::clone(&client));
        Ok(client)
    }

    async fn with_client<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&memcache::Client) -> Result<T> + Send + 'static,
    {
        run_blocking(self.connection()?, op).await
    }
}

/// Run a blocking client call on tokio's blocking pool
async fn run_blocking<C, T, F>(client: Arc<C>, op: F) -> Result<T>
where
    C: Send + Sync + 'static,
    T: Send + 'static,
    F: FnOnce(&C) -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || op(&client))
        .await
        .map_err(|e| anyhow!("Memcached task failed: {e}"))?
}

#[async_trait::async_trait]
impl CacheBackend for MemcachedCache {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let key = self.key.make_key(key);
        self.with_client(move |client| {
            client
                .get::<Vec<u8>>(&key)
                .map_err(|e| anyhow!("Memcached GET failed: {e}"))
        })
        .await
        .ok()
        .flatten()
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let key = self.key.make_key(key);
        let expiration = u32::try_from(ttl.as_secs()).unwrap_or(u32::MAX);
        let stored_key = key.clone();
        let value = value.to_vec();
        self.with_client(move |client| {
            client
                .set(&stored_key, value.as_slice(), expiration)
                .map_err(|e| anyhow!("Memcached SET failed: {e}"))
        })
        .await?;
        debug!(key = %key, ttl_secs = %ttl.as_secs(), "[Memcached] Cached key with TTL");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let key = self.key.make_key(key);
        self.with_client(move |client| {
            client
                .delete(&key)
                .map(|_| ())
                .map_err(|e| anyhow!("Memcached DELETE failed: {e}"))
        })
        .await
    }

    async fn clear(&self) -> Result<()> {
        self.with_client(|client| {
            client
                .flush()
                .map_err(|e| anyhow!("Memcached FLUSH failed: {e}"))
        })
        .await
    }

    async fn health_check(&self) -> bool {
        self.with_client(|client| {
            client
                .version()
                .map_err(|e| anyhow!("Memcached VERSION failed: {e}"))
        })
        .await
        .is_ok()
    }

    fn name(&self) -> &'static str {
        "Memcached"
    }

    fn default_timeout(&self) -> Duration {
        self.timeout
    }

    fn supports_close(&self) -> bool {
        true
    }

    fn close(&self) -> Result<()> {
        if self.client.lock().take().is_some() {
            debug!(servers = ?self.servers, "Memcached connection closed");
        }
        Ok(())
    }
}
