//! File-based Cache - On-Disk Backend
//!
//! Stores every entry in its own file under the directory given as the
//! backend name. File names are the md5 digest of the stored key; each file
//! holds an 8-byte big-endian expiry timestamp (Unix seconds) followed by
//! the value bytes.

use anyhow::{Context, Result, anyhow};
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

use crate::key::KeyParams;
use crate::traits::{CacheBackend, CacheParams};

const CACHE_SUFFIX: &str = ".cache";
const EXPIRY_LEN: usize = 8;

/// Default `MAX_ENTRIES`
pub const DEFAULT_MAX_ENTRIES: u64 = 300;
/// Default `CULL_FREQUENCY`: drop 1/3 of the entries when full
pub const DEFAULT_CULL_FREQUENCY: u64 = 3;

/// Directory-backed cache
///
/// **Options**:
/// - `TIMEOUT` - default entry lifetime in seconds (300)
/// - `MAX_ENTRIES` - entry count that triggers culling (300)
/// - `CULL_FREQUENCY` - fraction removed when culling is `1/n`; `0` clears everything (3)
pub struct FileBasedCache {
    dir: PathBuf,
    key: KeyParams,
    timeout: Duration,
    max_entries: u64,
    cull_frequency: u64,
}

impl FileBasedCache {
    /// Create the cache, creating `dir` if needed
    ///
    /// # Errors
    ///
    /// Returns an error if `dir` is empty or cannot be created.
    pub fn new(dir: &str, params: &CacheParams) -> Result<Self> {
        if dir.is_empty() {
            return Err(anyhow!("File-based cache requires a directory as its NAME"));
        }
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create cache directory: {dir}"))?;

        let max_entries = params.option_u64("max_entries").unwrap_or(DEFAULT_MAX_ENTRIES);
        let cull_frequency = params.option_u64("cull_frequency").unwrap_or(DEFAULT_CULL_FREQUENCY);
        info!(dir = %dir, max_entries, cull_frequency, "File-based Cache initialized");

        Ok(Self {
            dir: PathBuf::from(dir),
            key: params.key.clone(),
            timeout: params.timeout(),
            max_entries,
            cull_frequency,
        })
    }

    /// Constructor registered with the module loader
    ///
    /// # Errors
    ///
    /// See [`FileBasedCache::new`].
    pub fn build(name: &str, params: CacheParams) -> Result<Arc<dyn CacheBackend>> {
        Ok(Arc::new(Self::new(name, &params)?))
    }

    /// Directory holding the cache files
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of entry files currently on disk
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed.
    pub async fn len(&self) -> Result<usize> {
        Ok(self.entry_files().await?.len())
    }

    fn key_to_file(&self, key: &str) -> PathBuf {
        let digest = md5::compute(self.key.make_key(key).as_bytes());
        self.dir.join(format!("{digest:x}{CACHE_SUFFIX}"))
    }

    async fn entry_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.to_string_lossy().ends_with(CACHE_SUFFIX) {
                files.push(path);
            }
        }
        Ok(files)
    }

    /// Remove a share of the entries once `MAX_ENTRIES` is reached
    async fn cull(&self) -> Result<()> {
        let files = self.entry_files().await?;
        if (files.len() as u64) < self.max_entries {
            return Ok(());
        }

        let doomed: Vec<PathBuf> = if self.cull_frequency == 0 {
            files
        } else {
            let count = usize::try_from(files.len() as u64 / self.cull_frequency).unwrap_or(files.len());
            let mut rng = rand::thread_rng();
            files.choose_multiple(&mut rng, count).cloned().collect()
        };

        debug!(count = doomed.len(), "[FileBased] Culling entries");
        for path in doomed {
            remove_quietly(&path).await?;
        }
        Ok(())
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

/// Remove a file, treating "already gone" as success
async fn remove_quietly(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[async_trait::async_trait]
impl CacheBackend for FileBasedCache {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let path = self.key_to_file(key);
        let contents = tokio::fs::read(&path).await.ok()?;

        let (expiry, value) = contents.split_at_checked(EXPIRY_LEN)?;
        let expires_at = u64::from_be_bytes(expiry.try_into().ok()?);
        if expires_at <= unix_now() {
            let _ = remove_quietly(&path).await;
            return None;
        }
        Some(value.to_vec())
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        self.cull().await?;

        let path = self.key_to_file(key);
        let expires_at = unix_now().saturating_add(ttl.as_secs().max(1));
        let mut contents = Vec::with_capacity(EXPIRY_LEN + value.len());
        contents.extend_from_slice(&expires_at.to_be_bytes());
        contents.extend_from_slice(value);

        // Write then rename, so readers never see a partial file
        let tmp = path.with_extension(format!("tmp{}", rand::random::<u32>()));
        tokio::fs::write(&tmp, &contents)
            .await
            .with_context(|| format!("Failed to write cache file: {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(key = %key, ttl_secs = %ttl.as_secs(), "[FileBased] Cached key with TTL");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        remove_quietly(&self.key_to_file(key)).await
    }

    async fn clear(&self) -> Result<()> {
        for path in self.entry_files().await? {
            remove_quietly(&path).await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> bool {
        tokio::fs::metadata(&self.dir)
            .await
            .is_ok_and(|meta| meta.is_dir())
    }

    fn name(&self) -> &'static str {
        "FileBased"
    }

    fn default_timeout(&self) -> Duration {
        self.timeout
    }
}
