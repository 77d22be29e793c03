//! Module Loader
//!
//! Resolves backend paths (e.g. `cache_resolver.backends.locmem`) to loaded
//! backend modules, and key function paths to key functions. Applications
//! register their own backends here under any path they like; that path can
//! then be used as a `CACHES` `ENGINE`, a legacy URI scheme, or directly as
//! a backend identifier.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::backends;
use crate::error::{CacheError, Result};
use crate::factory::ConstructibleModule;
use crate::key::KeyFunction;
use crate::traits::{BackendBuilder, BackendModule};

/// Concurrent registry of backend modules and key functions
///
/// Cloning is cheap and clones share the same registry.
#[derive(Clone, Default)]
pub struct ModuleLoader {
    modules: Arc<DashMap<String, Arc<dyn BackendModule>>>,
    key_functions: Arc<DashMap<String, KeyFunction>>,
}

impl ModuleLoader {
    /// Empty loader
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader with the bundled backends registered under their canonical paths
    #[must_use]
    pub fn with_builtin_backends() -> Self {
        let loader = Self::new();
        backends::register_builtin(&loader);
        loader
    }

    /// Register a module under `path`, replacing any previous one
    pub fn register(&self, path: impl Into<String>, module: Arc<dyn BackendModule>) {
        let path = path.into();
        debug!(path = %path, "Registered backend module");
        self.modules.insert(path, module);
    }

    /// Register a constructible module built from `builder`
    pub fn register_builder(&self, path: impl Into<String>, builder: impl BackendBuilder + 'static) {
        self.register(path, Arc::new(ConstructibleModule::new(builder)));
    }

    /// Register a key function under `path`
    pub fn register_key_function<F>(&self, path: impl Into<String>, func: F)
    where
        F: Fn(&str, &str, i64) -> String + Send + Sync + 'static,
    {
        self.key_functions.insert(path.into(), Arc::new(func));
    }

    /// Whether a module is registered under `path`
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.modules.contains_key(path)
    }

    /// Load the module registered under `path`
    ///
    /// # Errors
    ///
    /// Returns `CacheError::ImportFailure` if nothing is registered there.
    pub fn load(&self, path: &str) -> Result<Arc<dyn BackendModule>> {
        self.modules
            .get(path)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| CacheError::ImportFailure {
                path: path.to_string(),
            })
    }

    /// Load the key function registered under `path`
    ///
    /// # Errors
    ///
    /// Returns `CacheError::InvalidKeyFunction` if nothing is registered there.
    pub fn load_key_function(&self, path: &str) -> Result<KeyFunction> {
        self.key_functions
            .get(path)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| CacheError::InvalidKeyFunction {
                path: path.to_string(),
            })
    }

    /// Registered backend paths, sorted
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.modules.iter().map(|entry| entry.key().clone()).collect();
        paths.sort();
        paths
    }
}
