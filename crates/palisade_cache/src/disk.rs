//! Disk-backed cache tier.
//!
//! Each entry is serialized as MessagePack to its own blob file, named by the
//! SHA-256 hash of the cache key. A single `metadata.json` index maps keys to
//! `{timestamp, path}` and is the only source of truth for presence and expiry.

use crate::{DiskStats, TierConfig};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use palisade_error::{PalisadeResult, StorageError, StorageErrorKind};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Name of the index file inside the cache directory.
const INDEX_FILE: &str = "metadata.json";

/// Index record for one cached key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct IndexEntry {
    /// Last write or last successful read
    timestamp: DateTime<Utc>,
    /// Blob file holding the serialized value
    path: PathBuf,
}

/// Mapping of cache key to index record, persisted as `metadata.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiskIndex {
    entries: HashMap<String, IndexEntry>,
}

impl DiskIndex {
    /// Look up the record for `key`.
    pub fn get(&self, key: &str) -> Option<&IndexEntry> {
        self.entries.get(key)
    }

    /// Number of indexed keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys sorted by timestamp, oldest first.
    fn oldest_first(&self) -> Vec<String> {
        let mut keys: Vec<_> = self
            .entries
            .iter()
            .map(|(key, entry)| (entry.timestamp, key.clone()))
            .collect();
        keys.sort();
        keys.into_iter().map(|(_, key)| key).collect()
    }
}

/// Persistent key/value store that survives process restarts.
///
/// Expired entries are swept before every write; the size bound is enforced
/// in the same critical section as the write (oldest timestamp first), and
/// once when the cache is opened. Reads refresh the entry's timestamp, which
/// approximates LRU ordering.
///
/// Filesystem and serialization failures are logged and reported as a miss
/// or a no-op. They never reach the caller.
///
/// # Example
///
/// ```
/// use palisade_cache::{PersistentCache, TierConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let dir = tempfile::tempdir()?;
/// let cache: PersistentCache<String> =
///     PersistentCache::open(dir.path(), TierConfig::new(10, 60.0)).await?;
///
/// cache.set("greeting", &"hello".to_string()).await;
/// assert_eq!(cache.get("greeting").await.as_deref(), Some("hello"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PersistentCache<V> {
    cache_dir: PathBuf,
    config: TierConfig,
    extension: String,
    index: Mutex<DiskIndex>,
    _value: PhantomData<fn() -> V>,
}

impl<V> PersistentCache<V>
where
    V: Serialize + DeserializeOwned,
{
    /// Open (or create) a disk cache in `cache_dir` using `.cache` blob files.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid or the directory cannot be created.
    pub async fn open(cache_dir: impl Into<PathBuf>, config: TierConfig) -> PalisadeResult<Self> {
        Self::open_with_extension(cache_dir, config, ".cache").await
    }

    /// Open (or create) a disk cache with a custom blob file extension.
    ///
    /// An unreadable or corrupt index is logged and replaced by an empty one.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid or the directory cannot be created.
    #[tracing::instrument(skip_all, fields(dir = tracing::field::Empty))]
    pub async fn open_with_extension(
        cache_dir: impl Into<PathBuf>,
        config: TierConfig,
        extension: impl Into<String>,
    ) -> PalisadeResult<Self> {
        config.validate()?;
        let cache_dir = cache_dir.into();
        tracing::Span::current().record("dir", tracing::field::display(cache_dir.display()));

        tokio::fs::create_dir_all(&cache_dir).await.map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                cache_dir.display(),
                e
            )))
        })?;

        let index = load_index(&cache_dir.join(INDEX_FILE)).await;
        let cache = Self {
            cache_dir,
            config,
            extension: extension.into(),
            index: Mutex::new(index),
            _value: PhantomData,
        };

        {
            let mut index = cache.index.lock().await;
            if cache.enforce_size_limit(&mut index).await > 0 {
                cache.persist_index(&index).await;
            }
            tracing::info!(entries = index.len(), "Opened disk cache");
        }

        Ok(cache)
    }

    /// Tier configuration.
    pub fn config(&self) -> &TierConfig {
        &self.config
    }

    /// Directory holding blobs and the index.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Look up `key`, refreshing its timestamp on a hit.
    ///
    /// Expired entries are deleted. An index entry whose blob has vanished is
    /// dropped. Unreadable blobs are reported as a miss.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, key: &str) -> Option<V> {
        let mut index = self.index.lock().await;
        let entry = index.entries.get(key)?.clone();

        if self.is_expired(&entry, Utc::now()) {
            tracing::debug!("Disk cache entry expired, removing");
            self.remove_entry(&mut index, key).await;
            self.persist_index(&index).await;
            return None;
        }

        match self.read_blob(&entry.path).await {
            Ok(Some(value)) => {
                if let Some(entry) = index.entries.get_mut(key) {
                    entry.timestamp = Utc::now();
                }
                self.persist_index(&index).await;
                tracing::debug!("Disk cache hit");
                Some(value)
            }
            Ok(None) => {
                tracing::warn!(path = %entry.path.display(), "Cache blob missing, dropping index entry");
                index.entries.remove(key);
                self.persist_index(&index).await;
                None
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to read disk cache entry");
                None
            }
        }
    }

    /// Store `value` under `key`.
    ///
    /// Sweeps expired entries first, then writes the blob, then evicts the
    /// oldest entries until the tier is within `max_size`.
    #[tracing::instrument(skip(self, value))]
    pub async fn set(&self, key: &str, value: &V) {
        let mut index = self.index.lock().await;
        self.cleanup_expired(&mut index).await;

        let path = self.blob_path(key);
        match self.write_blob(&path, value).await {
            Ok(()) => {
                index.entries.insert(
                    key.to_string(),
                    IndexEntry {
                        timestamp: Utc::now(),
                        path,
                    },
                );
                self.enforce_size_limit(&mut index).await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to write disk cache entry"),
        }

        self.persist_index(&index).await;
    }

    /// Remove `key` and its blob. Returns `true` if the key was indexed.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, key: &str) -> bool {
        let mut index = self.index.lock().await;
        let removed = self.remove_entry(&mut index, key).await;
        if removed {
            self.persist_index(&index).await;
        }
        removed
    }

    /// Remove every blob and empty the index.
    pub async fn clear(&self) {
        let mut index = self.index.lock().await;
        let count = index.len();
        for entry in index.entries.values() {
            remove_blob(&entry.path).await;
        }
        index.entries.clear();
        self.persist_index(&index).await;
        tracing::info!(cleared = count, "Cleared disk cache");
    }

    /// Check whether a non-expired entry is indexed for `key`.
    pub async fn contains_key(&self, key: &str) -> bool {
        let index = self.index.lock().await;
        index
            .get(key)
            .is_some_and(|entry| !self.is_expired(entry, Utc::now()))
    }

    /// Number of indexed entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.index.lock().await.len()
    }

    /// Check if no entries are indexed.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Occupancy and on-disk footprint.
    pub async fn stats(&self) -> DiskStats {
        let index = self.index.lock().await;
        let now = Utc::now();
        let expired_items = index
            .entries
            .values()
            .filter(|entry| self.is_expired(entry, now))
            .count();

        let mut total_size_bytes = 0;
        let mut file_count = 0;
        for entry in index.entries.values() {
            if let Ok(metadata) = tokio::fs::metadata(&entry.path).await {
                total_size_bytes += metadata.len();
                file_count += 1;
            }
        }

        DiskStats::new(
            index.len(),
            *self.config.max_size(),
            *self.config.ttl_secs(),
            expired_items,
            total_size_bytes,
            file_count,
        )
    }

    /// Blob path for `key`: `{cache_dir}/{sha256(key)}{extension}`.
    fn blob_path(&self, key: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        self.cache_dir
            .join(format!("{:x}{}", hasher.finalize(), self.extension))
    }

    fn is_expired(&self, entry: &IndexEntry, now: DateTime<Utc>) -> bool {
        // Timestamps in the future (clock skew) count as fresh.
        (now - entry.timestamp)
            .to_std()
            .is_ok_and(|elapsed| elapsed > self.config.ttl())
    }

    async fn remove_entry(&self, index: &mut DiskIndex, key: &str) -> bool {
        match index.entries.remove(key) {
            Some(entry) => {
                remove_blob(&entry.path).await;
                true
            }
            None => false,
        }
    }

    async fn cleanup_expired(&self, index: &mut DiskIndex) -> usize {
        let now = Utc::now();
        let expired: Vec<String> = index
            .entries
            .iter()
            .filter(|(_, entry)| self.is_expired(entry, now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove_entry(index, key).await;
        }
        if !expired.is_empty() {
            tracing::debug!(removed = expired.len(), "Swept expired disk cache entries");
        }
        expired.len()
    }

    async fn enforce_size_limit(&self, index: &mut DiskIndex) -> usize {
        let max_size = *self.config.max_size();
        if index.len() <= max_size {
            return 0;
        }

        let excess = index.len() - max_size;
        let victims: Vec<String> = index.oldest_first().into_iter().take(excess).collect();
        for key in &victims {
            tracing::debug!(key = %key, "Evicting oldest disk cache entry");
            self.remove_entry(index, key).await;
        }
        victims.len()
    }

    async fn read_blob(&self, path: &Path) -> PalisadeResult<Option<V>> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => Err(StorageError::new(StorageErrorKind::FileRead(format!(
                "{}: {}",
                path.display(),
                e
            ))))?,
        };

        let value = rmp_serde::from_slice(&bytes).map_err(|e| {
            StorageError::new(StorageErrorKind::Deserialization(format!(
                "{}: {}",
                path.display(),
                e
            )))
        })?;
        Ok(Some(value))
    }

    async fn write_blob(&self, path: &Path, value: &V) -> PalisadeResult<()> {
        let bytes = rmp_serde::to_vec_named(value)
            .map_err(|e| StorageError::new(StorageErrorKind::Serialization(e.to_string())))?;
        write_atomic(path, &bytes).await
    }

    async fn persist_index(&self, index: &DiskIndex) {
        if let Err(e) = save_index(&self.cache_dir.join(INDEX_FILE), index).await {
            tracing::error!(error = %e, "Failed to save disk cache index");
        }
    }
}

async fn load_index(path: &Path) -> DiskIndex {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return DiskIndex::default(),
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to read disk cache index");
            return DiskIndex::default();
        }
    };

    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        tracing::error!(path = %path.display(), error = %e, "Corrupt disk cache index, starting empty");
        DiskIndex::default()
    })
}

async fn save_index(path: &Path, index: &DiskIndex) -> PalisadeResult<()> {
    let bytes = serde_json::to_vec(index)
        .map_err(|e| StorageError::new(StorageErrorKind::Serialization(e.to_string())))?;
    write_atomic(path, &bytes).await
}

/// Write to a temp file first, then rename for atomicity.
async fn write_atomic(path: &Path, bytes: &[u8]) -> PalisadeResult<()> {
    let temp_path = path.with_extension("tmp");
    tokio::fs::write(&temp_path, bytes).await.map_err(|e| {
        StorageError::new(StorageErrorKind::FileWrite(format!(
            "{}: {}",
            temp_path.display(),
            e
        )))
    })?;

    tokio::fs::rename(&temp_path, path).await.map_err(|e| {
        StorageError::new(StorageErrorKind::FileWrite(format!(
            "rename {} to {}: {}",
            temp_path.display(),
            path.display(),
            e
        )))
    })?;
    Ok(())
}

async fn remove_blob(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            let err = StorageError::new(StorageErrorKind::FileDelete(format!(
                "{}: {}",
                path.display(),
                e
            )));
            tracing::error!(error = %err, "Failed to delete cache blob");
        }
    }
}
