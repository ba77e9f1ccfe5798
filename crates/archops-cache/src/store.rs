//! Persistent cache stores
//!
//! Two implementations of [`PersistentCache`]:
//!
//! - [`MemoryCache`]: moka-backed, process lifetime only
//! - [`FileCache`]: one file per key under a workspace directory, with a moka
//!   read-through layer in front
//!
//! Entries have no TTL. A key is only ever replaced by a later `put`.

use crate::error::{CacheError, CacheResult};
use archops_core::ContentHash;
use async_trait::async_trait;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Key/value store of raw response bodies keyed by resource path
#[async_trait]
pub trait PersistentCache: Send + Sync + Debug {
    /// Last stored body for `key`
    ///
    /// # Errors
    /// Returns an error if the backing store cannot be read
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store `body` under `key`, replacing any previous entry atomically
    ///
    /// # Errors
    /// Returns an error if the backing store cannot be written
    async fn put(&self, key: &str, body: &str) -> CacheResult<()>;
}

/// In-memory cache
#[derive(Debug, Clone)]
pub struct MemoryCache {
    inner: Cache<String, Arc<str>>,
}

impl MemoryCache {
    /// Create cache with max capacity
    #[inline]
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::new(max_capacity),
        }
    }

    /// Approximate entry count
    #[inline]
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl PersistentCache for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.inner.get(key).await.map(|body| body.to_string()))
    }

    async fn put(&self, key: &str, body: &str) -> CacheResult<()> {
        self.inner.insert(key.to_string(), Arc::from(body)).await;
        Ok(())
    }
}

/// On-disk entry envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Resource path the body belongs to
    pub key: String,
    /// Raw response body
    pub body: String,
}

/// File-backed cache scoped to one workspace directory
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
    hot: Cache<String, Arc<str>>,
}

static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

impl FileCache {
    /// Open (creating if needed) a cache directory
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created
    pub async fn open(dir: impl Into<PathBuf>, memory_capacity: u64) -> CacheResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| CacheError::io_error(&dir, e))?;
        tracing::debug!("opened persistent cache at {}", dir.display());
        Ok(Self {
            dir,
            hot: Cache::new(memory_capacity),
        })
    }

    /// Cache directory
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the entry for `key`
    #[must_use]
    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.json", ContentHash::of_text(key)))
    }

    /// All stored entries, in no particular order
    ///
    /// Only `<hash>.json` files whose hash matches the stored key are listed;
    /// foreign, misplaced and corrupt files are skipped.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be listed
    pub async fn entries(&self) -> CacheResult<Vec<CacheEntry>> {
        let mut out = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| CacheError::io_error(&self.dir, e))?;
        while let Some(item) = dir
            .next_entry()
            .await
            .map_err(|e| CacheError::io_error(&self.dir, e))?
        {
            let path = item.path();
            let Some(name) = entry_hash(&path) else {
                tracing::debug!("ignoring {} in cache directory", path.display());
                continue;
            };
            match read_entry(&path).await {
                Ok(Some(entry)) if ContentHash::of_text(&entry.key) == name => out.push(entry),
                Ok(Some(entry)) => {
                    tracing::warn!("skipping {}: holds {}", path.display(), entry.key);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("skipping cache entry: {}", e),
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl PersistentCache for FileCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        if let Some(body) = self.hot.get(key).await {
            return Ok(Some(body.to_string()));
        }

        let path = self.entry_path(key);
        let Some(entry) = read_entry(&path).await? else {
            return Ok(None);
        };
        if entry.key != key {
            return Err(CacheError::corrupt(
                &path,
                format!("entry belongs to {}", entry.key),
            ));
        }

        self.hot
            .insert(key.to_string(), Arc::from(entry.body.as_str()))
            .await;
        Ok(Some(entry.body))
    }

    async fn put(&self, key: &str, body: &str) -> CacheResult<()> {
        let path = self.entry_path(key);
        let entry = CacheEntry {
            key: key.to_string(),
            body: body.to_string(),
        };
        let bytes =
            serde_json::to_vec(&entry).map_err(|e| CacheError::corrupt(&path, e.to_string()))?;

        write_atomic(&path, &bytes).await?;
        self.hot.insert(key.to_string(), Arc::from(body)).await;
        tracing::trace!("cached {} ({} bytes)", key, body.len());
        Ok(())
    }
}

/// Hash encoded in an entry file name (`<hash>.json`)
fn entry_hash(path: &Path) -> Option<ContentHash> {
    if path.extension().and_then(|e| e.to_str()) != Some("json") {
        return None;
    }
    path.file_stem()?.to_str()?.parse().ok()
}

async fn read_entry(path: &Path) -> CacheResult<Option<CacheEntry>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CacheError::io_error(path, e)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| CacheError::corrupt(path, e.to_string()))
}

/// Write to a sibling temp file, then rename over the target
///
/// Readers observe either the old entry or the new one, never a partial write.
async fn write_atomic(path: &Path, bytes: &[u8]) -> CacheResult<()> {
    let seq = WRITE_SEQ.fetch_add(1, Ordering::Relaxed);
    let tmp = path.with_extension(format!("tmp-{}-{seq}", std::process::id()));

    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| CacheError::io_error(&tmp, e))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(CacheError::io_error(path, e));
    }
    Ok(())
}
