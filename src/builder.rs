//! Cache Context Builder
//!
//! Builds a [`CacheContext`] with a custom module loader or request
//! lifecycle. [`CacheContext::initialize`] is the shortcut for the defaults.
//!
//! # Example: Custom Backend
//!
//! ```rust,ignore
//! use cache_resolver::{CacheConfig, CacheContextBuilder, CacheSettings, ModuleLoader};
//!
//! let loader = ModuleLoader::with_builtin_backends();
//! loader.register_builder("my_app.cache.RedisCache", my_app::cache::build_redis);
//!
//! let settings = CacheSettings::with_default(
//!     CacheConfig::new("my_app.cache.RedisCache").with_name("redis://127.0.0.1:6379"),
//! );
//!
//! let caches = CacheContextBuilder::new(settings)
//!     .with_loader(loader)
//!     .build()?;
//! ```

use tracing::{debug, info};

use crate::error::Result;
use crate::factory;
use crate::legacy;
use crate::lifecycle::RequestLifecycle;
use crate::loader::ModuleLoader;
use crate::resolver::{CacheOverrides, ConfigResolver};
use crate::settings::{CacheSettings, DEFAULT_CACHE_ALIAS};
use crate::CacheContext;

/// Hook label under which the default cache's `close` is connected
pub const DEFAULT_CLOSE_HOOK: &str = "default_cache.close";

/// Builder for [`CacheContext`]
///
/// # Default Behavior
///
/// If no loader or lifecycle is provided, the builder uses:
/// - **Loader**: [`ModuleLoader::with_builtin_backends`]
/// - **Lifecycle**: a fresh [`RequestLifecycle`]
pub struct CacheContextBuilder {
    settings: CacheSettings,
    loader: Option<ModuleLoader>,
    lifecycle: Option<RequestLifecycle>,
}

impl CacheContextBuilder {
    /// Create a new builder for `settings`
    #[must_use]
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            settings,
            loader: None,
            lifecycle: None,
        }
    }

    /// Use `loader` to locate backend modules and key functions
    #[must_use]
    pub fn with_loader(mut self, loader: ModuleLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Connect the default cache's cleanup to `lifecycle`
    ///
    /// Useful when the application already has a lifecycle other hooks are
    /// connected to.
    #[must_use]
    pub fn with_lifecycle(mut self, lifecycle: RequestLifecycle) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    /// Build the context
    ///
    /// Runs the legacy bridge, builds the default cache and, if it supports
    /// `close`, connects that to the request lifecycle. Nothing is retried:
    /// any failure here means the application has no usable default cache
    /// and should not start serving.
    ///
    /// # Errors
    ///
    /// - `CacheError::MissingDefaultCache` if no `default` alias exists
    /// - `CacheError::InvalidFormat` for a malformed legacy `CACHE_BACKEND`
    /// - `CacheError::ImportFailure` / `InvalidBackendShape` / `Backend` if the
    ///   default cache cannot be built
    pub fn build(self) -> Result<CacheContext> {
        info!("Initializing cache context");

        let (settings, bridge) = legacy::migrate(self.settings)?;
        let loader = self.loader.unwrap_or_else(ModuleLoader::with_builtin_backends);
        let lifecycle = self.lifecycle.unwrap_or_default();
        let resolver = ConfigResolver::new(settings, loader);

        let resolved = resolver.resolve(DEFAULT_CACHE_ALIAS, &CacheOverrides::new())?;
        let default_cache = factory::instantiate(
            resolver.loader(),
            &resolved.engine,
            &resolved.name,
            resolved.params,
        )?;

        if default_cache.supports_close() {
            let cache = default_cache.clone();
            lifecycle.connect(DEFAULT_CLOSE_HOOK, move || cache.close());
            debug!(backend = default_cache.name(), "Default cache close connected to request lifecycle");
        }

        info!(
            engine = %resolved.engine,
            backend = default_cache.name(),
            bridge = ?bridge,
            "Cache context initialized"
        );

        Ok(CacheContext::from_parts(resolver, default_cache, lifecycle, bridge))
    }
}
