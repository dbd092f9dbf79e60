//! Tiered caching with TTL and LRU eviction.
//!
//! This crate provides the cache half of the Palisade resilience layer:
//!
//! - [`BoundedCache`] - fixed-capacity in-memory tier with TTL and strict LRU eviction
//! - [`PersistentCache`] - disk tier storing one blob per entry plus a metadata index,
//!   surviving process restarts
//! - [`TieredCacheManager`] - memory-first read-through with promotion, write-through
//!   to every enabled tier
//!
//! All storage faults in the disk tier are logged and treated as misses; a broken
//! cache never blocks the caller.
//!
//! # Example
//!
//! ```
//! use palisade_cache::{BoundedCache, TierConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = BoundedCache::new(TierConfig::new(2, 60.0))?;
//! cache.set("a", 1).await;
//! cache.set("b", 2).await;
//! cache.set("c", 3).await;
//!
//! assert_eq!(cache.get("a").await, None);
//! assert_eq!(cache.get("b").await, Some(2));
//! assert_eq!(cache.get("c").await, Some(3));
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod disk;
mod memory;
mod stats;
mod tiered;

pub use config::{CacheConfig, TierConfig, default_cache_dir};
pub use disk::{DiskIndex, IndexEntry, PersistentCache};
pub use memory::{BoundedCache, CacheEntry};
pub use stats::{CacheStats, DiskStats, MemoryStats};
pub use tiered::TieredCacheManager;
