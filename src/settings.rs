//! Cache Settings
//!
//! The multi-backend `CACHES` table and the deprecated flat `CACHE_*` fields.
//! Settings are plain data: load them from TOML, JSON or the environment, or
//! build them in code, then hand them to [`CacheContext`](crate::CacheContext).
//!
//! ```toml
//! [CACHES.default]
//! ENGINE = "cache_resolver.backends.locmem"
//! TIMEOUT = 60
//!
//! [CACHES.default.OPTIONS]
//! max_entries = 1000
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};
use crate::traits::CacheOptions;

/// Reserved alias of the process-wide default cache
pub const DEFAULT_CACHE_ALIAS: &str = "default";

/// Alias -> backend configuration
pub type CacheTable = BTreeMap<String, CacheConfig>;

/// One entry of the `CACHES` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Canonical backend path
    #[serde(rename = "ENGINE")]
    pub engine: String,
    /// Backend-specific location (host list, directory, table...)
    #[serde(rename = "NAME", default)]
    pub name: String,
    /// Backend options
    #[serde(rename = "OPTIONS", default)]
    pub options: CacheOptions,
    #[serde(rename = "VERSION", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(rename = "KEY_PREFIX", default, skip_serializing_if = "Option::is_none")]
    pub key_prefix: Option<String>,
    /// Path of a key function registered with the module loader
    #[serde(rename = "KEY_FUNCTION", default, skip_serializing_if = "Option::is_none")]
    pub key_function: Option<String>,
    /// Any other top-level key, e.g. `TIMEOUT`
    #[serde(flatten)]
    pub extra: CacheOptions,
}

impl CacheConfig {
    /// Entry for `engine` with no name and no options
    pub fn new(engine: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            name: String::new(),
            options: CacheOptions::new(),
            version: None,
            key_prefix: None,
            key_function: None,
            extra: CacheOptions::new(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_key_prefix(mut self, key_prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(key_prefix.into());
        self
    }

    #[must_use]
    pub fn with_version(mut self, version: i64) -> Self {
        self.version = Some(version);
        self
    }

    #[must_use]
    pub fn with_key_function(mut self, path: impl Into<String>) -> Self {
        self.key_function = Some(path.into());
        self
    }

    /// Extra top-level keys overlaid with `OPTIONS` (`OPTIONS` wins)
    #[must_use]
    pub fn merged_options(&self) -> CacheOptions {
        let mut merged = self.extra.clone();
        merged.extend(self.options.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }
}

fn default_backend() -> String {
    "locmem://".to_string()
}

const fn default_version() -> i64 {
    1
}

/// Cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Multi-backend table
    #[serde(rename = "CACHES", default)]
    pub caches: CacheTable,
    /// Deprecated: single backend URI, used only when `CACHES` is empty
    #[serde(rename = "CACHE_BACKEND", default = "default_backend")]
    pub cache_backend: String,
    /// Default key version
    #[serde(rename = "CACHE_VERSION", default = "default_version")]
    pub cache_version: i64,
    /// Default key prefix
    #[serde(rename = "CACHE_KEY_PREFIX", default)]
    pub cache_key_prefix: String,
    /// Default key function path
    #[serde(rename = "CACHE_KEY_FUNCTION", default)]
    pub cache_key_function: Option<String>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            caches: CacheTable::new(),
            cache_backend: default_backend(),
            cache_version: default_version(),
            cache_key_prefix: String::new(),
            cache_key_function: None,
        }
    }
}

impl CacheSettings {
    /// Settings with a single `default` entry
    #[must_use]
    pub fn with_default(config: CacheConfig) -> Self {
        let mut settings = Self::default();
        settings.caches.insert(DEFAULT_CACHE_ALIAS.to_string(), config);
        settings
    }

    /// Settings using only the deprecated single-backend URI
    pub fn legacy(backend_uri: impl Into<String>) -> Self {
        Self {
            cache_backend: backend_uri.into(),
            ..Self::default()
        }
    }

    /// Add or replace a table entry
    #[must_use]
    pub fn with_cache(mut self, alias: impl Into<String>, config: CacheConfig) -> Self {
        self.caches.insert(alias.into(), config);
        self
    }

    /// Parse settings from TOML text
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Settings` if the text is not valid settings TOML.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| CacheError::Settings(e.to_string()))
    }

    /// Parse settings from JSON text
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Settings` if the text is not valid settings JSON.
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| CacheError::Settings(e.to_string()))
    }

    /// Read the flat `CACHE_*` fields from the environment
    ///
    /// # Configuration
    ///
    /// - `CACHE_BACKEND` (default `locmem://`)
    /// - `CACHE_VERSION` (default `1`)
    /// - `CACHE_KEY_PREFIX` (default empty)
    /// - `CACHE_KEY_FUNCTION` (default unset)
    ///
    /// The `CACHES` table is left empty; add entries with [`Self::with_cache`].
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Settings` if `CACHE_VERSION` is not an integer.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Read the flat `CACHE_*` fields through `lookup`
    ///
    /// Same rules as [`Self::from_env`], for callers keeping settings in
    /// something other than the process environment.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Settings` if `CACHE_VERSION` is not an integer.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = Self::default();

        if let Some(backend) = lookup("CACHE_BACKEND") {
            settings.cache_backend = backend;
        }
        if let Some(version) = lookup("CACHE_VERSION") {
            settings.cache_version = version.trim().parse().map_err(|_| {
                CacheError::Settings(format!("CACHE_VERSION must be an integer, got '{version}'"))
            })?;
        }
        if let Some(prefix) = lookup("CACHE_KEY_PREFIX") {
            settings.cache_key_prefix = prefix;
        }
        settings.cache_key_function = lookup("CACHE_KEY_FUNCTION").filter(|path| !path.is_empty());

        Ok(settings)
    }
}
