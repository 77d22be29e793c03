//! Cache key parameters
//!
//! Every backend receives a key prefix, a version and a key function. The
//! key function turns a user key into the key actually stored.

use std::fmt;
use std::sync::Arc;

/// Function building the stored key from `(key, key_prefix, version)`
pub type KeyFunction = Arc<dyn Fn(&str, &str, i64) -> String + Send + Sync>;

/// Default key function: `prefix:version:key`
#[must_use]
pub fn default_key_func(key: &str, key_prefix: &str, version: i64) -> String {
    format!("{key_prefix}:{version}:{key}")
}

/// Key parameters handed to a backend at construction
#[derive(Clone)]
pub struct KeyParams {
    pub key_prefix: String,
    pub version: i64,
    /// Custom key function; `None` means [`default_key_func`]
    pub key_func: Option<KeyFunction>,
}

impl KeyParams {
    /// Build the stored key for `key` at the configured version
    #[must_use]
    pub fn make_key(&self, key: &str) -> String {
        self.make_key_versioned(key, self.version)
    }

    /// Build the stored key for `key` at an explicit version
    #[must_use]
    pub fn make_key_versioned(&self, key: &str, version: i64) -> String {
        match &self.key_func {
            Some(func) => func(key, &self.key_prefix, version),
            None => default_key_func(key, &self.key_prefix, version),
        }
    }
}

impl Default for KeyParams {
    fn default() -> Self {
        Self {
            key_prefix: String::new(),
            version: 1,
            key_func: None,
        }
    }
}

impl fmt::Debug for KeyParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyParams")
            .field("key_prefix", &self.key_prefix)
            .field("version", &self.version)
            .field("key_func", &self.key_func.as_ref().map(|_| "<fn>"))
            .finish()
    }
}
