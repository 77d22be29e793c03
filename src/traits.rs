//! Cache Backend Traits
//!
//! This module defines the capability contract every cache backend exposes,
//! and the two seams through which backends are plugged into the resolver.
//!
//! # Architecture
//!
//! - `CacheBackend`: the cache operations, plus an optional cleanup capability
//! - `BackendBuilder`: something that constructs a backend from `(name, params)`
//! - `BackendModule`: what the module loader hands back for a backend path;
//!   either constructible itself or exposing a `CacheClass` builder
//!
//! # Example: Custom Backend
//!
//! ```rust,ignore
//! use cache_resolver::{CacheBackend, async_trait};
//! use std::time::Duration;
//! use anyhow::Result;
//!
//! struct MyCustomCache {
//!     // Your implementation
//! }
//!
//! #[async_trait]
//! impl CacheBackend for MyCustomCache {
//!     async fn get(&self, key: &str) -> Option<Vec<u8>> {
//!         // Your implementation
//!     }
//!
//!     async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
//!         // Your implementation
//!     }
//!
//!     async fn remove(&self, key: &str) -> Result<()> {
//!         // Your implementation
//!     }
//!
//!     async fn clear(&self) -> Result<()> {
//!         // Your implementation
//!     }
//!
//!     async fn health_check(&self) -> bool {
//!         // Your implementation
//!     }
//! }
//! ```

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::key::KeyParams;

/// Backend-specific options, e.g. `TIMEOUT` or `max_entries`
pub type CacheOptions = BTreeMap<String, serde_json::Value>;

/// Default entry timeout when a backend is given no `TIMEOUT` option
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Everything a backend constructor receives besides its name
#[derive(Debug, Clone, Default)]
pub struct CacheParams {
    /// Backend options, passed through verbatim from configuration
    pub options: CacheOptions,
    /// Key prefix, version and key function
    pub key: KeyParams,
}

impl CacheParams {
    /// Look up an option by name, ignoring ASCII case
    #[must_use]
    pub fn option(&self, name: &str) -> Option<&serde_json::Value> {
        self.options
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    /// Read an integer option given either as a number or a numeric string
    ///
    /// URI query parameters always arrive as strings, settings files usually
    /// carry numbers; both forms are accepted.
    #[must_use]
    pub fn option_u64(&self, name: &str) -> Option<u64> {
        match self.option(name)? {
            serde_json::Value::Number(number) => number.as_u64(),
            serde_json::Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// Default entry timeout from the `TIMEOUT` option
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.option_u64("timeout")
            .map_or(DEFAULT_TIMEOUT, Duration::from_secs)
    }
}

/// Core cache backend trait
///
/// # Required Operations
///
/// - `get`: Retrieve a value by key
/// - `set_with_ttl`: Store a value with a time-to-live
/// - `remove`: Delete a value by key
/// - `clear`: Drop every entry
/// - `health_check`: Verify the backend is operational
///
/// # Cleanup Capability
///
/// Backends holding connections report `supports_close() == true` and
/// implement `close`. The default cache's `close` is invoked at the end of
/// every unit of work, so it must be idempotent and must not fail for an
/// already-closed backend.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to support concurrent access across async tasks.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get value from cache by key
    ///
    /// # Returns
    ///
    /// * `Some(value)` - Value found in cache (as bytes)
    /// * `None` - Key not found or expired
    async fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Set value in cache with time-to-live
    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    /// Set value in cache with the backend's default timeout
    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.set_with_ttl(key, value, self.default_timeout()).await
    }

    /// Remove value from cache (missing keys are not an error)
    async fn remove(&self, key: &str) -> Result<()>;

    /// Remove every entry from the cache
    async fn clear(&self) -> Result<()>;

    /// Check if cache backend is healthy
    async fn health_check(&self) -> bool;

    /// Get the name of this cache backend
    ///
    /// This is used for logging and debugging purposes.
    fn name(&self) -> &'static str {
        "unknown"
    }

    /// Timeout applied by `set`
    fn default_timeout(&self) -> Duration {
        DEFAULT_TIMEOUT
    }

    /// Whether this backend has cleanup work for `close`
    fn supports_close(&self) -> bool {
        false
    }

    /// Release per-request resources such as connections
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Constructs a backend from `(name, params)`
///
/// Implemented for every matching closure, so plain functions can be
/// registered directly:
///
/// ```rust,ignore
/// fn build(name: &str, params: CacheParams) -> anyhow::Result<Arc<dyn CacheBackend>> {
///     Ok(Arc::new(MyCustomCache::new(name, &params)))
/// }
/// ```
pub trait BackendBuilder: Send + Sync {
    /// Build a backend instance
    ///
    /// # Errors
    ///
    /// Whatever the backend reports; callers pass it through unchanged.
    fn build(&self, name: &str, params: CacheParams) -> Result<Arc<dyn CacheBackend>>;
}

impl<F> BackendBuilder for F
where
    F: Fn(&str, CacheParams) -> Result<Arc<dyn CacheBackend>> + Send + Sync,
{
    fn build(&self, name: &str, params: CacheParams) -> Result<Arc<dyn CacheBackend>> {
        self(name, params)
    }
}

/// A loaded backend module
///
/// Modules come in two historical shapes. A modern module is constructible
/// itself and answers `constructor()`. An older module is not, but exposes a
/// builder under the conventional `CacheClass` attribute. The factory probes
/// for these capabilities in that order.
pub trait BackendModule: Send + Sync {
    /// The module's own constructor, when the module is constructible
    fn constructor(&self) -> Option<&dyn BackendBuilder> {
        None
    }

    /// A named builder exposed by the module
    fn attribute(&self, _name: &str) -> Option<&dyn BackendBuilder> {
        None
    }
}
