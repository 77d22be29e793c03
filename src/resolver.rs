//! Config Resolver
//!
//! Turns a backend identifier into `(engine, name, params)`. Identifiers are
//! tried in a fixed order, so one string grammar serves three configuration
//! styles without collision:
//!
//! 1. **Legacy URI** - anything containing `://`, e.g. `memcached://127.0.0.1:11211/`
//! 2. **Alias** - a key of the `CACHES` table, e.g. `default`
//! 3. **Backend path** - a path registered with the [`ModuleLoader`]
//!
//! Resolution never modifies the settings: the same alias can be resolved
//! any number of times, from any number of threads, with the same result.

use std::sync::Arc;

use tracing::debug;

use crate::error::{CacheError, Result};
use crate::key::KeyParams;
use crate::loader::ModuleLoader;
use crate::schemes;
use crate::settings::{CacheConfig, CacheSettings};
use crate::traits::{CacheOptions, CacheParams};
use crate::uri::{is_backend_uri, parse_backend_uri};

/// Largest edit distance at which an alias is offered as a suggestion
const SUGGESTION_DISTANCE: usize = 2;

/// Per-call overrides for [`ConfigResolver::resolve`]
///
/// Key parameters set on an alias entry win over overrides; overrides win
/// over the flat settings defaults.
#[derive(Debug, Clone, Default)]
pub struct CacheOverrides {
    /// Backend name, used when the identifier is a bare backend path
    pub name: Option<String>,
    pub key_prefix: Option<String>,
    pub version: Option<i64>,
    /// Key function path
    pub key_function: Option<String>,
    /// Extra backend options, merged over configured ones
    pub options: CacheOptions,
}

impl CacheOverrides {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn key_prefix(mut self, key_prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(key_prefix.into());
        self
    }

    #[must_use]
    pub fn version(mut self, version: i64) -> Self {
        self.version = Some(version);
        self
    }

    #[must_use]
    pub fn key_function(mut self, path: impl Into<String>) -> Self {
        self.key_function = Some(path.into());
        self
    }

    #[must_use]
    pub fn option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// Result of resolving an identifier
#[derive(Debug, Clone)]
pub struct ResolvedBackend {
    /// Backend path to load
    pub engine: String,
    /// Backend name (host list, directory...)
    pub name: String,
    /// Options and key parameters for the constructor
    pub params: CacheParams,
}

/// Resolves identifiers against an immutable settings snapshot
#[derive(Clone)]
pub struct ConfigResolver {
    settings: Arc<CacheSettings>,
    loader: ModuleLoader,
}

impl ConfigResolver {
    /// Resolver over `settings` (expected to have been through the legacy bridge)
    #[must_use]
    pub fn new(settings: CacheSettings, loader: ModuleLoader) -> Self {
        Self {
            settings: Arc::new(settings),
            loader,
        }
    }

    /// Settings this resolver reads
    #[must_use]
    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Module loader this resolver consults
    #[must_use]
    pub fn loader(&self) -> &ModuleLoader {
        &self.loader
    }

    /// Configured aliases, sorted
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.settings.caches.keys().map(String::as_str)
    }

    /// Resolve `identifier` into the engine, name and params to build
    ///
    /// # Errors
    ///
    /// - `CacheError::InvalidFormat` for a malformed legacy URI
    /// - `CacheError::BackendNotFound` if the identifier is neither an alias
    ///   nor a registered backend path
    /// - `CacheError::InvalidKeyFunction` if a key function path is unknown
    pub fn resolve(&self, identifier: &str, overrides: &CacheOverrides) -> Result<ResolvedBackend> {
        if is_backend_uri(identifier) {
            return self.resolve_uri(identifier, overrides);
        }

        if let Some(entry) = self.settings.caches.get(identifier) {
            debug!(alias = %identifier, engine = %entry.engine, "Resolved cache alias");
            let mut options = entry.merged_options();
            options.extend(overrides.options.clone());
            return Ok(ResolvedBackend {
                engine: entry.engine.clone(),
                name: entry.name.clone(),
                params: CacheParams {
                    options,
                    key: self.key_params(Some(entry), overrides)?,
                },
            });
        }

        if self.loader.contains(identifier) {
            debug!(path = %identifier, "Identifier is not an alias; using it as a backend path");
            return Ok(ResolvedBackend {
                engine: identifier.to_string(),
                name: overrides.name.clone().unwrap_or_default(),
                params: CacheParams {
                    options: overrides.options.clone(),
                    key: self.key_params(None, overrides)?,
                },
            });
        }

        Err(CacheError::BackendNotFound {
            identifier: identifier.to_string(),
            suggestion: self.suggest_alias(identifier),
        })
    }

    fn resolve_uri(&self, uri: &str, overrides: &CacheOverrides) -> Result<ResolvedBackend> {
        let parsed = parse_backend_uri(uri)?;
        let engine = schemes::canonicalize(&parsed.scheme);
        debug!(uri = %uri, engine = %engine, "Resolved legacy backend URI");

        let mut options: CacheOptions = parsed
            .params
            .into_iter()
            .map(|(key, value)| (key, serde_json::Value::String(value)))
            .collect();
        options.extend(overrides.options.clone());

        Ok(ResolvedBackend {
            engine,
            name: parsed.host,
            params: CacheParams {
                options,
                key: self.key_params(None, overrides)?,
            },
        })
    }

    /// The alias entry, then overrides, then the flat settings defaults
    fn key_params(&self, entry: Option<&CacheConfig>, overrides: &CacheOverrides) -> Result<KeyParams> {
        let key_prefix = entry
            .and_then(|e| e.key_prefix.clone())
            .or_else(|| overrides.key_prefix.clone())
            .unwrap_or_else(|| self.settings.cache_key_prefix.clone());
        let version = entry
            .and_then(|e| e.version)
            .or(overrides.version)
            .unwrap_or(self.settings.cache_version);
        let key_function = entry
            .and_then(|e| e.key_function.as_deref())
            .or(overrides.key_function.as_deref())
            .or(self.settings.cache_key_function.as_deref());

        let key_func = key_function
            .map(|path| self.loader.load_key_function(path))
            .transpose()?;

        Ok(KeyParams {
            key_prefix,
            version,
            key_func,
        })
    }

    fn suggest_alias(&self, identifier: &str) -> Option<String> {
        self.aliases()
            .map(|alias| (strsim::levenshtein(identifier, alias), alias))
            .filter(|(distance, _)| *distance <= SUGGESTION_DISTANCE)
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, alias)| alias.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemes::backend_path;
    use serde_json::json;

    fn resolver(settings: CacheSettings) -> ConfigResolver {
        ConfigResolver::new(settings, ModuleLoader::with_builtin_backends())
    }

    #[test]
    fn test_alias_returns_engine() {
        let resolver = resolver(CacheSettings::with_default(CacheConfig::new("X").with_name("n")));
        let resolved = resolver.resolve("default", &CacheOverrides::new()).unwrap();
        assert_eq!(resolved.engine, "X");
        assert_eq!(resolved.name, "n");
    }

    #[test]
    fn test_alias_resolution_is_repeatable() {
        let config = CacheConfig::new("X").with_option("max_entries", 10);
        let resolver = resolver(CacheSettings::with_default(config.clone()));

        let first = resolver.resolve("default", &CacheOverrides::new()).unwrap();
        let second = resolver.resolve("default", &CacheOverrides::new()).unwrap();
        assert_eq!(first.engine, second.engine);
        assert_eq!(first.params.options, second.params.options);
        assert_eq!(resolver.settings().caches["default"], config);
    }

    #[test]
    fn test_uri_overrides_win_over_params() {
        let resolver = resolver(CacheSettings::default());
        let overrides = CacheOverrides::new().option("timeout", 5).option("extra", "yes");
        let resolved = resolver
            .resolve("file:///var/tmp/cache?timeout=30&max_entries=9", &overrides)
            .unwrap();

        assert_eq!(resolved.engine, backend_path("filebased"));
        assert_eq!(resolved.name, "/var/tmp/cache");
        assert_eq!(resolved.params.options["timeout"], json!(5));
        assert_eq!(resolved.params.options["max_entries"], json!("9"));
        assert_eq!(resolved.params.options["extra"], json!("yes"));
    }

    #[test]
    fn test_uri_is_tried_before_alias() {
        let settings = CacheSettings::default().with_cache("locmem://", CacheConfig::new("X"));
        let resolved = resolver(settings).resolve("locmem://", &CacheOverrides::new()).unwrap();
        assert_eq!(resolved.engine, backend_path("locmem"));
    }

    #[test]
    fn test_raw_path_fallback() {
        let resolver = resolver(CacheSettings::default());
        let overrides = CacheOverrides::new().name("shared").option("max_entries", 3);
        let resolved = resolver.resolve(&backend_path("locmem"), &overrides).unwrap();
        assert_eq!(resolved.engine, backend_path("locmem"));
        assert_eq!(resolved.name, "shared");
        assert_eq!(resolved.params.options.len(), 1);
    }

    #[test]
    fn test_unknown_identifier_suggests_alias() {
        let resolver = resolver(CacheSettings::with_default(CacheConfig::new("X")));
        let err = resolver.resolve("defualt", &CacheOverrides::new()).unwrap_err();
        match err {
            CacheError::BackendNotFound { identifier, suggestion } => {
                assert_eq!(identifier, "defualt");
                assert_eq!(suggestion.as_deref(), Some("default"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = resolver.resolve("my_app.cache.Custom", &CacheOverrides::new()).unwrap_err();
        assert!(matches!(err, CacheError::BackendNotFound { suggestion: None, .. }));
    }

    #[test]
    fn test_key_param_precedence() {
        let mut settings = CacheSettings::with_default(CacheConfig::new("X").with_version(5));
        settings.cache_key_prefix = "flat".to_string();
        settings.cache_version = 2;
        let resolver = resolver(settings);

        let resolved = resolver.resolve("default", &CacheOverrides::new()).unwrap();
        assert_eq!(resolved.params.key.key_prefix, "flat");
        assert_eq!(resolved.params.key.version, 5);

        // Entry VERSION beats the caller; the caller beats the flat prefix
        let overrides = CacheOverrides::new().key_prefix("call").version(3);
        let resolved = resolver.resolve("default", &overrides).unwrap();
        assert_eq!(resolved.params.key.key_prefix, "call");
        assert_eq!(resolved.params.key.version, 5);

        let resolved = resolver.resolve("locmem://", &CacheOverrides::new()).unwrap();
        assert_eq!(resolved.params.key.version, 2);

        let resolved = resolver.resolve("locmem://", &overrides).unwrap();
        assert_eq!(resolved.params.key.key_prefix, "call");
        assert_eq!(resolved.params.key.version, 3);
    }

    #[test]
    fn test_entry_key_function_beats_override() {
        let loader = ModuleLoader::with_builtin_backends();
        loader.register_key_function("app.keys.entry", |key, _, _| format!("entry:{key}"));
        loader.register_key_function("app.keys.call", |key, _, _| format!("call:{key}"));
        let settings = CacheSettings::with_default(
            CacheConfig::new("X")
                .with_key_prefix("entry")
                .with_key_function("app.keys.entry"),
        );
        let resolver = ConfigResolver::new(settings, loader);

        let overrides = CacheOverrides::new()
            .key_prefix("call")
            .key_function("app.keys.call");
        let resolved = resolver.resolve("default", &overrides).unwrap();
        assert_eq!(resolved.params.key.key_prefix, "entry");
        assert_eq!(resolved.params.key.make_key("k"), "entry:k");
    }

    #[test]
    fn test_key_function_lookup() {
        let loader = ModuleLoader::with_builtin_backends();
        loader.register_key_function("app.keys.flat", |key, prefix, _| format!("{prefix}-{key}"));
        let settings = CacheSettings::with_default(
            CacheConfig::new("X")
                .with_key_prefix("p")
                .with_key_function("app.keys.flat"),
        )
        .with_cache("broken", CacheConfig::new("X").with_key_function("app.keys.gone"));
        let resolver = ConfigResolver::new(settings, loader);

        let resolved = resolver.resolve("default", &CacheOverrides::new()).unwrap();
        assert_eq!(resolved.params.key.make_key("k"), "p-k");

        let err = resolver.resolve("broken", &CacheOverrides::new()).unwrap_err();
        assert!(matches!(err, CacheError::InvalidKeyFunction { path } if path == "app.keys.gone"));
    }
}
