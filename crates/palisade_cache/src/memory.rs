//! In-memory cache tier with TTL and LRU eviction.

use crate::{MemoryStats, TierConfig};
use derive_getters::Getters;
use palisade_error::PalisadeResult;
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;
use tokio::sync::Mutex;

/// Cached value with the instant it was written.
#[derive(Debug, Clone, Getters)]
pub struct CacheEntry<V> {
    key: String,
    value: V,
    stored_at: Instant,
    #[getter(skip)]
    recency: u64,
}

impl<V> CacheEntry<V> {
    /// Check whether this entry has outlived `ttl`.
    pub fn is_expired(&self, config: &TierConfig) -> bool {
        self.stored_at.elapsed() > config.ttl()
    }
}

/// Entries plus a recency index ordered least- to most-recently used.
#[derive(Debug)]
struct MemoryState<V> {
    entries: HashMap<String, CacheEntry<V>>,
    recency: BTreeMap<u64, String>,
    clock: u64,
}

impl<V> MemoryState<V> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            recency: BTreeMap::new(),
            clock: 0,
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.recency.remove(&entry.recency);
        Some(entry)
    }

    fn touch(&mut self, key: &str) {
        let tick = self.next_tick();
        if let Some(entry) = self.entries.get_mut(key) {
            self.recency.remove(&entry.recency);
            entry.recency = tick;
            self.recency.insert(tick, key.to_string());
        }
    }

    fn evict_lru(&mut self) -> Option<String> {
        let (_, key) = self.recency.pop_first()?;
        self.entries.remove(&key);
        Some(key)
    }
}

/// Fixed-capacity key/value store with TTL and least-recently-used eviction.
///
/// Size never exceeds `max_size`: eviction happens eagerly on every insert.
/// Expiry is lazy: an entry past its TTL is removed by the next `get` that
/// touches it.
///
/// One mutex guards the whole store; it is held for a single operation only.
///
/// # Example
///
/// ```
/// use palisade_cache::{BoundedCache, TierConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let cache = BoundedCache::new(TierConfig::new(10, 60.0))?;
/// cache.set("answer", vec![4, 2]).await;
/// assert_eq!(cache.get("answer").await, Some(vec![4, 2]));
/// assert!(cache.delete("answer").await);
/// assert_eq!(cache.get("answer").await, None);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct BoundedCache<V> {
    config: TierConfig,
    state: Mutex<MemoryState<V>>,
}

impl<V: Clone> BoundedCache<V> {
    /// Create an empty cache.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` has a zero capacity or a non-positive TTL.
    pub fn new(config: TierConfig) -> PalisadeResult<Self> {
        config.validate()?;
        tracing::debug!(
            max_size = config.max_size(),
            ttl_secs = config.ttl_secs(),
            "Creating new BoundedCache"
        );
        Ok(Self {
            config,
            state: Mutex::new(MemoryState::new()),
        })
    }

    /// Tier configuration.
    pub fn config(&self) -> &TierConfig {
        &self.config
    }

    /// Look up `key`, marking it most recently used on a hit.
    ///
    /// Returns `None` if the key is absent or expired; expired entries are removed.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, key: &str) -> Option<V> {
        let mut state = self.state.lock().await;

        let expired = state.entries.get(key)?.is_expired(&self.config);
        if expired {
            tracing::debug!("Memory cache entry expired, removing");
            state.remove(key);
            return None;
        }

        state.touch(key);
        tracing::debug!("Memory cache hit");
        state.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Insert or replace `key`, evicting the least recently used entry when full.
    #[tracing::instrument(skip(self, value))]
    pub async fn set(&self, key: &str, value: V) {
        let mut state = self.state.lock().await;

        state.remove(key);

        if state.entries.len() >= *self.config.max_size()
            && let Some(evicted) = state.evict_lru()
        {
            tracing::debug!(evicted = %evicted, "Evicting LRU entry");
        }

        let tick = state.next_tick();
        state.recency.insert(tick, key.to_string());
        state.entries.insert(
            key.to_string(),
            CacheEntry {
                key: key.to_string(),
                value,
                stored_at: Instant::now(),
                recency: tick,
            },
        );
    }

    /// Remove `key`. Returns `true` if it was present.
    pub async fn delete(&self, key: &str) -> bool {
        self.state.lock().await.remove(key).is_some()
    }

    /// Remove every entry.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        let count = state.entries.len();
        state.entries.clear();
        state.recency.clear();
        tracing::info!(cleared = count, "Cleared memory cache");
    }

    /// Keys ordered from least to most recently used.
    pub async fn keys(&self) -> Vec<String> {
        self.state.lock().await.recency.values().cloned().collect()
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    /// Check if the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Occupancy statistics.
    pub async fn stats(&self) -> MemoryStats {
        let state = self.state.lock().await;
        let expired_items = state
            .entries
            .values()
            .filter(|entry| entry.is_expired(&self.config))
            .count();
        MemoryStats::new(
            state.entries.len(),
            *self.config.max_size(),
            *self.config.ttl_secs(),
            expired_items,
        )
    }
}
