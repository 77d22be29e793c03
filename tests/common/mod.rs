//! Common utilities for integration tests
//!
//! This module provides shared test infrastructure including:
//! - A recording backend that counts constructions and `close` calls
//! - Loader setup with test backends registered in both module shapes
//! - Tracing setup driven by `RUST_LOG`

#![allow(dead_code)]

use anyhow::Result;
use cache_resolver::{
    BackendBuilder, CacheBackend, CacheParams, LegacyModule, ModuleLoader, async_trait,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Backend path of the constructible recording backend
pub const RECORDING_PATH: &str = "tests.backends.Recording";
/// Backend path of the `CacheClass`-style recording backend
pub const LEGACY_RECORDING_PATH: &str = "tests.backends.legacy_recording";

/// Install a tracing subscriber once; honours `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Counters shared between a recording builder and the backends it builds
#[derive(Debug, Default)]
pub struct Counters {
    pub built: AtomicUsize,
    pub closed: AtomicUsize,
    /// Name and params of the most recent construction
    pub last_built: Mutex<Option<(String, CacheParams)>>,
}

impl Counters {
    pub fn built(&self) -> usize {
        self.built.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn last_built(&self) -> Option<(String, CacheParams)> {
        self.last_built.lock().clone()
    }
}

/// Backend that remembers how it was built and counts `close` calls
pub struct RecordingBackend {
    pub location: String,
    pub params: CacheParams,
    counters: Arc<Counters>,
}

#[async_trait]
impl CacheBackend for RecordingBackend {
    async fn get(&self, _key: &str) -> Option<Vec<u8>> {
        None
    }

    async fn set_with_ttl(&self, _key: &str, _value: &[u8], _ttl: Duration) -> Result<()> {
        Ok(())
    }

    async fn remove(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "Recording"
    }

    fn supports_close(&self) -> bool {
        true
    }

    fn close(&self) -> Result<()> {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Builder producing `RecordingBackend`s
pub struct RecordingBuilder {
    pub counters: Arc<Counters>,
}

impl BackendBuilder for RecordingBuilder {
    fn build(&self, name: &str, params: CacheParams) -> Result<Arc<dyn CacheBackend>> {
        self.counters.built.fetch_add(1, Ordering::SeqCst);
        *self.counters.last_built.lock() = Some((name.to_string(), params.clone()));
        Ok(Arc::new(RecordingBackend {
            location: name.to_string(),
            params,
            counters: Arc::clone(&self.counters),
        }))
    }
}

/// Loader with the bundled backends plus the recording backend in both shapes
pub fn test_loader() -> (ModuleLoader, Arc<Counters>) {
    let counters = Arc::new(Counters::default());
    let loader = ModuleLoader::with_builtin_backends();
    loader.register_builder(
        RECORDING_PATH,
        RecordingBuilder {
            counters: Arc::clone(&counters),
        },
    );
    loader.register(
        LEGACY_RECORDING_PATH,
        Arc::new(LegacyModule::with_cache_class(RecordingBuilder {
            counters: Arc::clone(&counters),
        })),
    );
    (loader, counters)
}
