//! Memory-first tiered cache manager.

use crate::{BoundedCache, CacheConfig, CacheStats, PersistentCache};
use palisade_error::PalisadeResult;
use serde::{Serialize, de::DeserializeOwned};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

/// Composes a [`BoundedCache`] and a [`PersistentCache`].
///
/// - `get` checks memory, then disk; a disk hit is promoted into memory.
/// - `set`, `delete` and `clear` apply to every enabled tier.
/// - Each tier can be switched off and on at runtime.
///
/// # Example
///
/// ```
/// use palisade_cache::{BoundedCache, PersistentCache, TierConfig, TieredCacheManager};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let dir = tempfile::tempdir()?;
/// let memory = BoundedCache::new(TierConfig::new(10, 60.0))?;
/// let disk = PersistentCache::open(dir.path(), TierConfig::new(100, 600.0)).await?;
/// let cache = TieredCacheManager::new(Some(memory), Some(disk));
///
/// cache.set("k", serde_json::json!({"v": 1})).await;
/// assert!(cache.get("k").await.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TieredCacheManager<V> {
    memory: Option<BoundedCache<V>>,
    disk: Option<PersistentCache<V>>,
    memory_enabled: AtomicBool,
    disk_enabled: AtomicBool,
}

impl<V> TieredCacheManager<V>
where
    V: Clone + Serialize + DeserializeOwned,
{
    /// Compose the given tiers; a `None` tier is permanently absent.
    pub fn new(memory: Option<BoundedCache<V>>, disk: Option<PersistentCache<V>>) -> Self {
        tracing::debug!(
            memory = memory.is_some(),
            disk = disk.is_some(),
            "Creating new TieredCacheManager"
        );
        Self {
            memory,
            disk,
            memory_enabled: AtomicBool::new(true),
            disk_enabled: AtomicBool::new(true),
        }
    }

    /// Build both tiers from configuration.
    ///
    /// Tiers disabled in `config` are not constructed; the disk directory is
    /// only created when the disk tier is enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the disk directory
    /// cannot be created.
    pub async fn from_config(config: &CacheConfig) -> PalisadeResult<Self> {
        config.validate()?;

        let memory = if *config.memory_enabled() {
            Some(BoundedCache::new(config.memory().clone())?)
        } else {
            None
        };

        let disk = if *config.disk_enabled() {
            Some(
                PersistentCache::open_with_extension(
                    config.resolved_cache_dir(),
                    config.disk().clone(),
                    config.extension().clone(),
                )
                .await?,
            )
        } else {
            None
        };

        Ok(Self::new(memory, disk))
    }

    /// The memory tier, if present and enabled.
    pub fn memory(&self) -> Option<&BoundedCache<V>> {
        self.memory
            .as_ref()
            .filter(|_| self.memory_enabled.load(Ordering::Relaxed))
    }

    /// The disk tier, if present and enabled.
    pub fn disk(&self) -> Option<&PersistentCache<V>> {
        self.disk
            .as_ref()
            .filter(|_| self.disk_enabled.load(Ordering::Relaxed))
    }

    /// Switch the memory tier on or off.
    pub fn set_memory_enabled(&self, enabled: bool) {
        self.memory_enabled.store(enabled, Ordering::Relaxed);
        tracing::info!(enabled, "Memory cache tier toggled");
    }

    /// Switch the disk tier on or off.
    pub fn set_disk_enabled(&self, enabled: bool) {
        self.disk_enabled.store(enabled, Ordering::Relaxed);
        tracing::info!(enabled, "Disk cache tier toggled");
    }

    /// Look up `key` in memory, then on disk, promoting disk hits into memory.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, key: &str) -> Option<V> {
        if let Some(memory) = self.memory()
            && let Some(value) = memory.get(key).await
        {
            tracing::debug!("Memory cache hit");
            return Some(value);
        }

        if let Some(disk) = self.disk()
            && let Some(value) = disk.get(key).await
        {
            tracing::debug!("Disk cache hit");
            if let Some(memory) = self.memory() {
                memory.set(key, value.clone()).await;
            }
            return Some(value);
        }

        tracing::debug!("Cache miss");
        None
    }

    /// Write `value` to every enabled tier.
    #[tracing::instrument(skip(self, value))]
    pub async fn set(&self, key: &str, value: V) {
        if let Some(disk) = self.disk() {
            disk.set(key, &value).await;
        }
        if let Some(memory) = self.memory() {
            memory.set(key, value).await;
        }
        tracing::debug!("Cached value");
    }

    /// Remove `key` from every enabled tier. Returns `true` if any tier had it.
    pub async fn delete(&self, key: &str) -> bool {
        let mut deleted = false;
        if let Some(memory) = self.memory() {
            deleted |= memory.delete(key).await;
        }
        if let Some(disk) = self.disk() {
            deleted |= disk.delete(key).await;
        }
        deleted
    }

    /// Empty every enabled tier.
    pub async fn clear(&self) {
        if let Some(memory) = self.memory() {
            memory.clear().await;
        }
        if let Some(disk) = self.disk() {
            disk.clear().await;
        }
        tracing::debug!("Cleared all cache tiers");
    }

    /// Statistics for each enabled tier.
    pub async fn stats(&self) -> CacheStats {
        let memory = match self.memory() {
            Some(memory) => Some(memory.stats().await),
            None => None,
        };
        let disk = match self.disk() {
            Some(disk) => Some(disk.stats().await),
            None => None,
        };
        CacheStats::new(memory, disk)
    }

    /// Return the cached value for `key`, or compute, cache and return it.
    ///
    /// Only `Ok` results are cached; errors pass straight through.
    pub async fn get_or_insert_with<F, Fut, E>(&self, key: &str, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        let value = compute().await?;
        self.set(key, value.clone()).await;
        Ok(value)
    }
}
