//! Cache occupancy statistics.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// Statistics for the memory tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct MemoryStats {
    total_items: usize,
    max_size: usize,
    ttl_secs: f64,
    usage_percent: f64,
    expired_items: usize,
}

impl MemoryStats {
    pub(crate) fn new(
        total_items: usize,
        max_size: usize,
        ttl_secs: f64,
        expired_items: usize,
    ) -> Self {
        Self {
            total_items,
            max_size,
            ttl_secs,
            usage_percent: usage_percent(total_items, max_size),
            expired_items,
        }
    }
}

/// Statistics for the disk tier, including on-disk footprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct DiskStats {
    total_items: usize,
    max_size: usize,
    ttl_secs: f64,
    usage_percent: f64,
    expired_items: usize,
    total_size_bytes: u64,
    total_size_mb: f64,
    file_count: usize,
}

impl DiskStats {
    pub(crate) fn new(
        total_items: usize,
        max_size: usize,
        ttl_secs: f64,
        expired_items: usize,
        total_size_bytes: u64,
        file_count: usize,
    ) -> Self {
        Self {
            total_items,
            max_size,
            ttl_secs,
            usage_percent: usage_percent(total_items, max_size),
            expired_items,
            total_size_bytes,
            total_size_mb: total_size_bytes as f64 / 1024.0 / 1024.0,
            file_count,
        }
    }
}

/// Statistics for both tiers; a disabled tier reports `None`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Getters)]
pub struct CacheStats {
    memory: Option<MemoryStats>,
    disk: Option<DiskStats>,
}

impl CacheStats {
    pub(crate) fn new(memory: Option<MemoryStats>, disk: Option<DiskStats>) -> Self {
        Self { memory, disk }
    }
}

fn usage_percent(total_items: usize, max_size: usize) -> f64 {
    if max_size == 0 {
        0.0
    } else {
        total_items as f64 / max_size as f64 * 100.0
    }
}
