//! Cache tier configuration.

use derive_getters::Getters;
use palisade_error::{ConfigError, PalisadeResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Capacity and lifetime settings for one cache tier.
///
/// # Example
///
/// ```toml
/// [cache.memory]
/// max_size = 100
/// ttl_secs = 3600
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, derive_setters::Setters)]
#[setters(prefix = "with_")]
pub struct TierConfig {
    /// Maximum number of entries held by the tier
    max_size: usize,

    /// Entry lifetime in seconds
    ttl_secs: f64,
}

impl TierConfig {
    /// Create a tier configuration.
    pub fn new(max_size: usize, ttl_secs: f64) -> Self {
        Self { max_size, ttl_secs }
    }

    /// Default memory tier: 100 entries, one hour.
    pub fn memory_default() -> Self {
        Self::new(100, 3600.0)
    }

    /// Default disk tier: 1000 entries, one day.
    pub fn disk_default() -> Self {
        Self::new(1000, 86_400.0)
    }

    /// Entry lifetime as a [`Duration`].
    pub fn ttl(&self) -> Duration {
        Duration::try_from_secs_f64(self.ttl_secs).unwrap_or(Duration::ZERO)
    }

    /// Validates capacity and lifetime.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_size` is zero or `ttl_secs` is not a positive number.
    pub fn validate(&self) -> PalisadeResult<()> {
        if self.max_size == 0 {
            Err(ConfigError::new("cache max_size must be greater than zero"))?
        }
        if !self.ttl_secs.is_finite() || self.ttl_secs <= 0.0 {
            Err(ConfigError::new(format!(
                "cache ttl_secs must be positive, got {}",
                self.ttl_secs
            )))?
        }
        Ok(())
    }
}

/// Configuration for the tiered cache manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, derive_setters::Setters)]
#[setters(prefix = "with_")]
pub struct CacheConfig {
    /// Memory tier settings
    #[serde(default = "TierConfig::memory_default")]
    memory: TierConfig,

    /// Disk tier settings
    #[serde(default = "TierConfig::disk_default")]
    disk: TierConfig,

    /// Whether the memory tier is consulted
    #[serde(default = "default_enabled")]
    memory_enabled: bool,

    /// Whether the disk tier is consulted
    #[serde(default = "default_enabled")]
    disk_enabled: bool,

    /// Directory for disk tier blobs and index (defaults to `~/.palisade/cache`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cache_dir: Option<PathBuf>,

    /// File extension for blob files
    #[serde(default = "default_extension")]
    extension: String,
}

fn default_enabled() -> bool {
    true
}

fn default_extension() -> String {
    ".cache".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory: TierConfig::memory_default(),
            disk: TierConfig::disk_default(),
            memory_enabled: default_enabled(),
            disk_enabled: default_enabled(),
            cache_dir: None,
            extension: default_extension(),
        }
    }
}

impl CacheConfig {
    /// Directory the disk tier writes to.
    pub fn resolved_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(default_cache_dir)
    }

    /// Validates both tiers.
    ///
    /// # Errors
    ///
    /// Returns an error if either tier configuration is invalid.
    pub fn validate(&self) -> PalisadeResult<()> {
        self.memory.validate()?;
        self.disk.validate()?;
        Ok(())
    }
}

/// Default disk cache location: `~/.palisade/cache`, or the temp dir without a home.
pub fn default_cache_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".palisade")
        .join("cache")
}
