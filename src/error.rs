//! Error types for cache resolution and instantiation

use thiserror::Error;

/// Errors raised while resolving a backend identifier or building a backend
#[derive(Debug, Error)]
pub enum CacheError {
    /// Legacy backend URI does not follow `scheme://...`
    #[error("Backend URI must start with scheme:// (got '{uri}')")]
    InvalidFormat { uri: String },

    /// Identifier is neither a configured alias nor a loadable backend path
    #[error("Could not find a cache backend named '{identifier}'{}", did_you_mean(.suggestion.as_deref()))]
    BackendNotFound {
        identifier: String,
        /// Closest configured alias, when one is near enough to be a likely typo
        suggestion: Option<String>,
    },

    /// Backend path is not registered with the module loader
    #[error("Could not import backend module '{path}'")]
    ImportFailure { path: String },

    /// Loaded module is neither constructible nor exposes `CacheClass`
    #[error("Backend module '{path}' is not constructible and exposes no CacheClass")]
    InvalidBackendShape { path: String },

    /// No `default` alias after legacy migration
    #[error("You must define a '{alias}' cache")]
    MissingDefaultCache { alias: String },

    /// `KEY_FUNCTION` names a function the loader does not know
    #[error("Could not import key function '{path}'")]
    InvalidKeyFunction { path: String },

    /// Settings text could not be deserialized
    #[error("Invalid cache settings: {0}")]
    Settings(String),

    /// Error raised by the backend's own constructor, passed through as-is
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

fn did_you_mean(suggestion: Option<&str>) -> String {
    suggestion.map_or_else(String::new, |alias| format!(" (did you mean '{alias}'?)"))
}

/// Result alias used across the crate
pub type Result<T, E = CacheError> = std::result::Result<T, E>;
