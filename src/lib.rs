//! Cache Resolver
//!
//! Resolves a logical cache identifier into a ready-to-use cache backend:
//! - **Aliases**: named entries of a multi-backend `CACHES` table (`"default"`)
//! - **Legacy URIs**: the deprecated `scheme://host?params` single-backend format
//! - **Backend paths**: any backend registered with the [`ModuleLoader`]
//!
//! On top of that it builds the application's default cache once, at
//! startup, and wires its cleanup to the end of every request.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use cache_resolver::{CacheBackend, CacheContext, CacheOverrides, CacheSettings};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Build the context once, at startup
//!     let settings = CacheSettings::from_toml_str(r#"
//!         [CACHES.default]
//!         ENGINE = "cache_resolver.backends.locmem"
//!     "#)?;
//!     let caches = CacheContext::initialize(settings)?;
//!
//!     // Per request: the guard runs cleanup hooks when dropped
//!     {
//!         let _request = caches.begin_request();
//!         caches.cache().set("user:1", b"alice").await?;
//!     }
//!
//!     // Any other cache, by URI, alias or backend path
//!     let scratch = caches.get_cache("locmem://?max_entries=50", &CacheOverrides::new())?;
//!     scratch.set("tmp", b"1").await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! identifier → ConfigResolver ─┬─ "://"  → uri::parse_backend_uri → schemes::canonicalize
//!                              ├─ alias  → CACHES entry
//!                              └─ path   → ModuleLoader::contains
//!            → factory::instantiate → BackendProvider (Direct | CacheClass) → Arc<dyn CacheBackend>
//! ```

use std::sync::Arc;
use tracing::{info, warn};

pub mod backends;
pub mod builder;
pub mod error;
pub mod factory;
pub mod key;
pub mod legacy;
pub mod lifecycle;
pub mod loader;
pub mod resolver;
pub mod schemes;
pub mod settings;
pub mod traits;
pub mod uri;

pub use backends::{DummyCache, FileBasedCache, LocMemCache};

#[cfg(feature = "backend-memcached")]
pub use backends::MemcachedCache;

pub use builder::CacheContextBuilder;
pub use error::{CacheError, Result};
pub use factory::{BackendProvider, ConstructibleModule, LegacyModule};
pub use key::{KeyFunction, KeyParams};
pub use legacy::BridgeOutcome;
pub use lifecycle::{RequestGuard, RequestLifecycle};
pub use loader::ModuleLoader;
pub use resolver::{CacheOverrides, ConfigResolver, ResolvedBackend};
pub use settings::{CacheConfig, CacheSettings, CacheTable, DEFAULT_CACHE_ALIAS};
pub use traits::{BackendBuilder, BackendModule, CacheBackend, CacheOptions, CacheParams};

// Re-export async_trait for user convenience
pub use async_trait::async_trait;

/// Application-wide cache context
///
/// Holds the default cache, built exactly once when the context is created,
/// and the resolver used for every other cache. Create it during startup and
/// pass it (or clones of it) to whatever needs caching; clones share the same
/// default cache instance.
///
/// # Example
///
/// ```rust,no_run
/// use cache_resolver::{CacheContext, CacheSettings};
///
/// # fn main() -> cache_resolver::Result<()> {
/// // Legacy single-backend settings are migrated automatically
/// let caches = CacheContext::initialize(CacheSettings::legacy("locmem://"))?;
/// assert!(caches.migrated_from_legacy());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CacheContext {
    resolver: ConfigResolver,
    default_cache: Arc<dyn CacheBackend>,
    lifecycle: RequestLifecycle,
    bridge: BridgeOutcome,
}

impl CacheContext {
    /// Build a context with the bundled backends and a fresh request lifecycle
    ///
    /// # Errors
    ///
    /// - `CacheError::MissingDefaultCache` if no `default` alias exists after
    ///   legacy migration
    /// - any resolution or construction error for the default cache
    pub fn initialize(settings: CacheSettings) -> Result<Self> {
        CacheContextBuilder::new(settings).build()
    }

    /// Start building a context with a custom loader or lifecycle
    #[must_use]
    pub fn builder(settings: CacheSettings) -> CacheContextBuilder {
        CacheContextBuilder::new(settings)
    }

    pub(crate) fn from_parts(
        resolver: ConfigResolver,
        default_cache: Arc<dyn CacheBackend>,
        lifecycle: RequestLifecycle,
        bridge: BridgeOutcome,
    ) -> Self {
        Self {
            resolver,
            default_cache,
            lifecycle,
            bridge,
        }
    }

    /// The default cache
    #[must_use]
    pub fn cache(&self) -> &Arc<dyn CacheBackend> {
        &self.default_cache
    }

    /// Build a new, caller-owned cache for `identifier`
    ///
    /// `identifier` may be a legacy URI, a `CACHES` alias or a backend path.
    /// Each call constructs a fresh instance; its cleanup is the caller's
    /// business. Use [`CacheContext::cache`] for the shared default cache.
    ///
    /// # Errors
    ///
    /// Any `CacheError` from resolution or construction.
    pub fn get_cache(&self, identifier: &str, overrides: &CacheOverrides) -> Result<Arc<dyn CacheBackend>> {
        let resolved = self.resolver.resolve(identifier, overrides)?;
        factory::instantiate(
            self.resolver.loader(),
            &resolved.engine,
            &resolved.name,
            resolved.params,
        )
    }

    /// Resolver over the (migrated) settings
    #[must_use]
    pub fn resolver(&self) -> &ConfigResolver {
        &self.resolver
    }

    /// Lifecycle the default cache's cleanup is connected to
    #[must_use]
    pub fn lifecycle(&self) -> &RequestLifecycle {
        &self.lifecycle
    }

    /// Start a unit of work; cleanup hooks run when the guard is dropped
    #[must_use = "hooks run when the guard is dropped"]
    pub fn begin_request(&self) -> RequestGuard {
        self.lifecycle.begin_request()
    }

    /// Whether the `default` entry was synthesized from legacy settings
    #[must_use]
    pub fn migrated_from_legacy(&self) -> bool {
        self.bridge == BridgeOutcome::Migrated
    }

    /// Perform health check on the default cache
    pub async fn health_check(&self) -> bool {
        let healthy = self.default_cache.health_check().await;
        if healthy {
            info!(backend = self.default_cache.name(), "Default cache health check passed");
        } else {
            warn!(backend = self.default_cache.name(), "Default cache health check failed");
        }
        healthy
    }
}
