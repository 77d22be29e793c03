//! Bundled Cache Backends
//!
//! # Available Backends
//!
//! | Scheme      | Canonical path                      | Backend            |
//! |-------------|-------------------------------------|--------------------|
//! | `locmem`    | `cache_resolver.backends.locmem`    | [`LocMemCache`]    |
//! | `file`      | `cache_resolver.backends.filebased` | [`FileBasedCache`] |
//! | `dummy`     | `cache_resolver.backends.dummy`     | [`DummyCache`]     |
//! | `memcached` | `cache_resolver.backends.memcached` | `MemcachedCache` (feature: `memcached`) |
//! | `db`        | `cache_resolver.backends.db`        | none bundled; register your own |
//!
//! # Usage
//!
//! ```rust
//! use cache_resolver::backends::LocMemCache;
//! use cache_resolver::{CacheBackend, CacheParams};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let cache = LocMemCache::new("", &CacheParams::default());
//! cache.set("user:1", b"alice").await?;
//! assert_eq!(cache.get("user:1").await, Some(b"alice".to_vec()));
//! # Ok(())
//! # }
//! ```

pub mod dummy;
pub mod filebased;
pub mod locmem;

#[cfg(feature = "backend-memcached")]
pub mod memcached;

pub use dummy::DummyCache;
pub use filebased::FileBasedCache;
pub use locmem::LocMemCache;

#[cfg(feature = "backend-memcached")]
pub use memcached::MemcachedCache;

use crate::loader::ModuleLoader;
use crate::schemes::backend_path;

/// Register every bundled backend under its canonical path
pub(crate) fn register_builtin(loader: &ModuleLoader) {
    loader.register_builder(backend_path("locmem"), LocMemCache::build);
    loader.register_builder(backend_path("filebased"), FileBasedCache::build);
    loader.register_builder(backend_path("dummy"), DummyCache::build);

    #[cfg(feature = "backend-memcached")]
    loader.register_builder(backend_path("memcached"), MemcachedCache::build);
}
