//! Layered Palisade configuration.
//!
//! Configuration is merged from, in increasing precedence:
//! - Bundled defaults (include_str! from palisade.toml)
//! - `~/.config/palisade/palisade.toml`
//! - `./palisade.toml`

use config::{Config, File, FileFormat};
use derive_getters::Getters;
use palisade_cache::CacheConfig;
use palisade_error::{ConfigError, PalisadeError, PalisadeResult};
use palisade_retry::RetryConfig;
use palisade_usage::UsageConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Bundled default configuration.
const DEFAULT_CONFIG: &str = include_str!("../palisade.toml");

/// Cache, retry and usage settings for every client built from it.
///
/// # Example
///
/// ```no_run
/// use palisade_client::PalisadeConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = PalisadeConfig::load()?;
/// println!("retries: {}", config.retry().retry_count());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, derive_setters::Setters)]
#[setters(prefix = "with_")]
pub struct PalisadeConfig {
    /// Tiered cache settings
    #[serde(default)]
    cache: CacheConfig,

    /// Retry settings for outbound calls
    #[serde(default = "RetryConfig::transient")]
    retry: RetryConfig,

    /// Usage governor settings and per-service quotas
    #[serde(default)]
    usage: UsageConfig,
}

impl Default for PalisadeConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            retry: RetryConfig::transient(),
            usage: UsageConfig::default(),
        }
    }
}

impl PalisadeConfig {
    /// Load configuration from a specific file path, layered over the bundled defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> PalisadeResult<Self> {
        debug!("Loading configuration from file");

        let config: Self = Self::defaults_builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .map_err(|e| {
                PalisadeError::from(ConfigError::new(format!(
                    "Failed to read configuration from {}: {}",
                    path.as_ref().display(),
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                PalisadeError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string, layered over the bundled defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the text cannot be parsed or validated.
    pub fn from_toml(text: &str) -> PalisadeResult<Self> {
        let config: Self = Self::defaults_builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|e| {
                PalisadeError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with precedence: current dir > home dir > bundled defaults.
    ///
    /// User config files are optional and silently skipped if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if a present file cannot be parsed or the merged
    /// configuration is invalid.
    #[instrument]
    pub fn load() -> PalisadeResult<Self> {
        debug!("Loading configuration with precedence: current dir > home dir > bundled defaults");

        let mut builder = Self::defaults_builder();

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/palisade/palisade.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder.add_source(File::with_name("palisade").required(false));

        let config: Self = builder
            .build()
            .map_err(|e| {
                PalisadeError::from(ConfigError::new(format!(
                    "Failed to build configuration: {}",
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                PalisadeError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })?;
        config.validate()?;
        Ok(config)
    }

    /// The bundled defaults alone.
    ///
    /// # Errors
    ///
    /// Returns an error only if the bundled file is malformed.
    pub fn bundled() -> PalisadeResult<Self> {
        Self::from_toml(DEFAULT_CONFIG)
    }

    /// Builder seeded with the bundled defaults as the lowest-precedence source.
    fn defaults_builder() -> config::ConfigBuilder<config::builder::DefaultState> {
        Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> PalisadeResult<()> {
        self.cache.validate()?;
        self.retry.validate()?;
        self.usage.validate()?;
        Ok(())
    }
}
