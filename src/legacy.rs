//! Legacy settings bridge
//!
//! Before the `CACHES` table existed, a process had exactly one cache,
//! configured by a backend URI plus flat `CACHE_VERSION`, `CACHE_KEY_PREFIX`
//! and `CACHE_KEY_FUNCTION` settings. When the table is empty, this bridge
//! synthesizes its `default` entry from those flat settings. It runs once,
//! while the [`CacheContext`](crate::CacheContext) is being built.

use tracing::{debug, warn};

use crate::error::{CacheError, Result};
use crate::schemes;
use crate::settings::{CacheConfig, CacheSettings, DEFAULT_CACHE_ALIAS};
use crate::uri::parse_backend_uri;

/// What the bridge did with the settings it was given
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeOutcome {
    /// `CACHES` was already populated and left untouched
    AlreadyConfigured,
    /// `CACHES` was empty and a `default` entry was synthesized
    Migrated,
}

/// Ensure `settings.caches` holds a usable `default` entry
///
/// Query parameters of the legacy URI win over the flat settings for
/// `version`, `key_prefix` and `key_function`; every other parameter becomes
/// a backend option.
///
/// # Errors
///
/// - `CacheError::InvalidFormat` if the legacy URI is malformed
/// - `CacheError::Settings` if a `version` query parameter is not an integer
/// - `CacheError::MissingDefaultCache` if no `default` entry exists afterwards
pub fn migrate(mut settings: CacheSettings) -> Result<(CacheSettings, BridgeOutcome)> {
    let outcome = if settings.caches.is_empty() {
        warn!(
            backend = %settings.cache_backend,
            "settings.CACHE_* is deprecated; use settings.CACHES instead"
        );
        let entry = legacy_entry(&settings)?;
        debug!(engine = %entry.engine, name = %entry.name, "Synthesized default cache from legacy settings");
        settings.caches.insert(DEFAULT_CACHE_ALIAS.to_string(), entry);
        BridgeOutcome::Migrated
    } else {
        BridgeOutcome::AlreadyConfigured
    };

    if !settings.caches.contains_key(DEFAULT_CACHE_ALIAS) {
        return Err(CacheError::MissingDefaultCache {
            alias: DEFAULT_CACHE_ALIAS.to_string(),
        });
    }

    Ok((settings, outcome))
}

fn legacy_entry(settings: &CacheSettings) -> Result<CacheConfig> {
    let parsed = parse_backend_uri(&settings.cache_backend)?;

    let mut version = settings.cache_version;
    let mut key_prefix = settings.cache_key_prefix.clone();
    let mut key_function = settings.cache_key_function.clone();
    let mut entry = CacheConfig::new(schemes::canonicalize(&parsed.scheme)).with_name(parsed.host);

    for (key, value) in parsed.params {
        match key.to_ascii_lowercase().as_str() {
            "version" => {
                version = value.trim().parse().map_err(|_| {
                    CacheError::Settings(format!("version must be an integer, got '{value}'"))
                })?;
            }
            "key_prefix" => key_prefix = value,
            "key_function" => key_function = Some(value),
            _ => {
                entry.options.insert(key, serde_json::Value::String(value));
            }
        }
    }

    entry.version = Some(version);
    entry.key_prefix = Some(key_prefix);
    entry.key_function = key_function;
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_table_is_migrated() {
        let (settings, outcome) = migrate(CacheSettings::legacy("locmem://")).unwrap();
        assert_eq!(outcome, BridgeOutcome::Migrated);
        assert_eq!(settings.caches.len(), 1);

        let entry = &settings.caches[DEFAULT_CACHE_ALIAS];
        assert_eq!(entry.engine, "cache_resolver.backends.locmem");
        assert_eq!(entry.name, "");
        assert_eq!(entry.version, Some(1));
        assert_eq!(entry.key_prefix.as_deref(), Some(""));
        assert!(entry.key_function.is_none());
    }

    #[test]
    fn test_query_params_win_over_flat_settings() {
        let mut legacy = CacheSettings::legacy(
            "memcached://127.0.0.1:11211/?timeout=60&version=7&key_prefix=uri",
        );
        legacy.cache_version = 2;
        legacy.cache_key_prefix = "flat".to_string();
        legacy.cache_key_function = Some("app.keys.flat".to_string());

        let (settings, _) = migrate(legacy).unwrap();
        let entry = &settings.caches[DEFAULT_CACHE_ALIAS];
        assert_eq!(entry.engine, "cache_resolver.backends.memcached");
        assert_eq!(entry.name, "127.0.0.1:11211");
        assert_eq!(entry.version, Some(7));
        assert_eq!(entry.key_prefix.as_deref(), Some("uri"));
        assert_eq!(entry.key_function.as_deref(), Some("app.keys.flat"));
        assert_eq!(entry.options.len(), 1);
        assert_eq!(entry.options["timeout"], json!("60"));
    }

    #[test]
    fn test_custom_scheme_passes_through() {
        let (settings, _) = migrate(CacheSettings::legacy("my_app.cache.Backend://shard1")).unwrap();
        assert_eq!(settings.caches[DEFAULT_CACHE_ALIAS].engine, "my_app.cache.Backend");
    }

    #[test]
    fn test_populated_table_is_untouched() {
        let configured = CacheSettings::with_default(CacheConfig::new("X"));
        let (settings, outcome) = migrate(configured.clone()).unwrap();
        assert_eq!(outcome, BridgeOutcome::AlreadyConfigured);
        assert_eq!(settings, configured);
    }

    #[test]
    fn test_table_without_default_fails() {
        let settings = CacheSettings::default().with_cache("sessions", CacheConfig::new("X"));
        let err = migrate(settings).unwrap_err();
        assert!(matches!(err, CacheError::MissingDefaultCache { alias } if alias == "default"));
    }

    #[test]
    fn test_malformed_legacy_uri_fails() {
        let err = migrate(CacheSettings::legacy("locmem")).unwrap_err();
        assert!(matches!(err, CacheError::InvalidFormat { .. }));
    }

    #[test]
    fn test_second_pass_is_a_no_op() {
        let (once, first) = migrate(CacheSettings::legacy("locmem://")).unwrap();
        let (twice, second) = migrate(once.clone()).unwrap();
        assert_eq!(first, BridgeOutcome::Migrated);
        assert_eq!(second, BridgeOutcome::AlreadyConfigured);
        assert_eq!(once, twice);
    }
}
