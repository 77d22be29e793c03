//! Backend Factory
//!
//! Loads a backend module by path and constructs an instance from it.
//!
//! Two module shapes are supported, probed in this order:
//!
//! 1. **Direct** - the module is constructible itself ([`ConstructibleModule`])
//! 2. **`CacheClass`** - the module exposes a builder under the conventional
//!    `CacheClass` attribute ([`LegacyModule`])
//!
//! Anything else is rejected with `CacheError::InvalidBackendShape`. Errors
//! raised by the backend constructor are passed through unchanged.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{CacheError, Result};
use crate::loader::ModuleLoader;
use crate::traits::{BackendBuilder, BackendModule, CacheBackend, CacheParams};

/// Attribute name older backend modules expose their builder under
pub const CACHE_CLASS_ATTRIBUTE: &str = "CacheClass";

/// A module that is constructible itself
pub struct ConstructibleModule {
    builder: Box<dyn BackendBuilder>,
}

impl ConstructibleModule {
    pub fn new(builder: impl BackendBuilder + 'static) -> Self {
        Self {
            builder: Box::new(builder),
        }
    }
}

impl BackendModule for ConstructibleModule {
    fn constructor(&self) -> Option<&dyn BackendBuilder> {
        Some(self.builder.as_ref())
    }
}

/// An older-style module exposing named builders as attributes
#[derive(Default)]
pub struct LegacyModule {
    attributes: HashMap<String, Box<dyn BackendBuilder>>,
}

impl LegacyModule {
    /// Module with no attributes (matches neither supported shape)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Module exposing `builder` as `CacheClass`
    pub fn with_cache_class(builder: impl BackendBuilder + 'static) -> Self {
        Self::new().with_attribute(CACHE_CLASS_ATTRIBUTE, builder)
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, builder: impl BackendBuilder + 'static) -> Self {
        self.attributes.insert(name.into(), Box::new(builder));
        self
    }
}

impl BackendModule for LegacyModule {
    fn attribute(&self, name: &str) -> Option<&dyn BackendBuilder> {
        self.attributes.get(name).map(|builder| &**builder)
    }
}

/// A loaded module, adapted to one of the two supported shapes
#[derive(Clone)]
pub enum BackendProvider {
    /// Module is constructible itself
    Direct {
        path: String,
        module: Arc<dyn BackendModule>,
    },
    /// Module exposes a `CacheClass` builder
    CacheClass {
        path: String,
        module: Arc<dyn BackendModule>,
    },
}

impl BackendProvider {
    /// Pick the adapter for `module` by probing its capabilities
    ///
    /// # Errors
    ///
    /// Returns `CacheError::InvalidBackendShape` if the module is neither
    /// constructible nor exposes `CacheClass`.
    pub fn probe(path: &str, module: Arc<dyn BackendModule>) -> Result<Self> {
        let path = path.to_string();
        if module.constructor().is_some() {
            Ok(Self::Direct { path, module })
        } else if module.attribute(CACHE_CLASS_ATTRIBUTE).is_some() {
            Ok(Self::CacheClass { path, module })
        } else {
            Err(CacheError::InvalidBackendShape { path })
        }
    }

    /// Short label of the adapter, for logging
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Direct { .. } => "direct",
            Self::CacheClass { .. } => "CacheClass",
        }
    }

    /// Backend path the module was loaded from
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Direct { path, .. } | Self::CacheClass { path, .. } => path,
        }
    }

    /// Construct a backend instance
    ///
    /// # Errors
    ///
    /// Returns the constructor's own error as `CacheError::Backend`.
    pub fn instantiate(&self, name: &str, params: CacheParams) -> Result<Arc<dyn CacheBackend>> {
        let builder = match self {
            Self::Direct { module, .. } => module.constructor(),
            Self::CacheClass { module, .. } => module.attribute(CACHE_CLASS_ATTRIBUTE),
        }
        .ok_or_else(|| CacheError::InvalidBackendShape {
            path: self.path().to_string(),
        })?;

        Ok(builder.build(name, params)?)
    }
}

/// Load `backend_path` and construct a backend from it
///
/// # Errors
///
/// - `CacheError::ImportFailure` if the path is not registered
/// - `CacheError::InvalidBackendShape` if the module matches neither shape
/// - `CacheError::Backend` if the constructor fails
pub fn instantiate(
    loader: &ModuleLoader,
    backend_path: &str,
    name: &str,
    params: CacheParams,
) -> Result<Arc<dyn CacheBackend>> {
    let module = loader.load(backend_path)?;
    let provider = BackendProvider::probe(backend_path, module)?;

    debug!(path = %backend_path, name = %name, shape = provider.kind(), "Instantiating cache backend");
    provider.instantiate(name, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::DummyCache;

    fn build_dummy(_name: &str, _params: CacheParams) -> anyhow::Result<Arc<dyn CacheBackend>> {
        Ok(Arc::new(DummyCache::new()))
    }

    fn build_failing(_name: &str, _params: CacheParams) -> anyhow::Result<Arc<dyn CacheBackend>> {
        Err(anyhow::anyhow!("server list is empty"))
    }

    #[test]
    fn test_direct_shape_is_preferred() {
        struct Both {
            direct: ConstructibleModule,
            legacy: LegacyModule,
        }
        impl BackendModule for Both {
            fn constructor(&self) -> Option<&dyn BackendBuilder> {
                self.direct.constructor()
            }
            fn attribute(&self, name: &str) -> Option<&dyn BackendBuilder> {
                self.legacy.attribute(name)
            }
        }

        let module = Arc::new(Both {
            direct: ConstructibleModule::new(build_dummy),
            legacy: LegacyModule::with_cache_class(build_dummy),
        });
        let provider = BackendProvider::probe("both", module).unwrap();
        assert_eq!(provider.kind(), "direct");
    }

    #[test]
    fn test_cache_class_fallback() {
        let provider =
            BackendProvider::probe("old", Arc::new(LegacyModule::with_cache_class(build_dummy))).unwrap();
        assert_eq!(provider.kind(), "CacheClass");
        let backend = provider.instantiate("", CacheParams::default()).unwrap();
        assert_eq!(backend.name(), "Dummy");
    }

    #[test]
    fn test_other_attributes_do_not_count() {
        let module = LegacyModule::new().with_attribute("Cache", build_dummy);
        let err = BackendProvider::probe("odd", Arc::new(module)).err().unwrap();
        assert!(matches!(err, CacheError::InvalidBackendShape { path } if path == "odd"));
    }

    #[test]
    fn test_unregistered_path_is_import_failure() {
        let loader = ModuleLoader::new();
        let err = instantiate(&loader, "nowhere.backend", "", CacheParams::default())
            .err()
            .unwrap();
        assert!(matches!(err, CacheError::ImportFailure { path } if path == "nowhere.backend"));
    }

    #[test]
    fn test_constructor_error_passes_through() {
        let loader = ModuleLoader::new();
        loader.register_builder("broken", build_failing);
        let err = instantiate(&loader, "broken", "", CacheParams::default()).err().unwrap();
        assert!(matches!(err, CacheError::Backend(_)));
        assert_eq!(err.to_string(), "server list is empty");
    }
}
