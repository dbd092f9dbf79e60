//! Shared resilience state handed to every client.

use crate::{ApiResponse, PalisadeConfig};
use palisade_cache::TieredCacheManager;
use palisade_error::PalisadeResult;
use palisade_retry::RetryConfig;
use palisade_usage::UsageGovernor;
use std::sync::Arc;
use tracing::info;

/// Cache, governor and retry settings shared by a set of clients.
///
/// Build one per process (or per test) and pass it to each client; clients
/// clone the `Arc`s, so they observe the same cache entries and quotas.
#[derive(Debug, Clone)]
pub struct ClientContext {
    cache: Option<Arc<TieredCacheManager<ApiResponse>>>,
    governor: Option<Arc<UsageGovernor>>,
    retry: RetryConfig,
}

impl Default for ClientContext {
    fn default() -> Self {
        Self {
            cache: None,
            governor: None,
            retry: RetryConfig::transient(),
        }
    }
}

impl ClientContext {
    /// Context with explicit parts.
    pub fn new(
        cache: Option<Arc<TieredCacheManager<ApiResponse>>>,
        governor: Option<Arc<UsageGovernor>>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            cache,
            governor,
            retry,
        }
    }

    /// Open the configured cache and usage directories.
    ///
    /// The cache is omitted when both tiers are disabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or a directory cannot
    /// be created.
    pub async fn from_config(config: &PalisadeConfig) -> PalisadeResult<Self> {
        config.validate()?;

        let cache_config = config.cache();
        let cache = if *cache_config.memory_enabled() || *cache_config.disk_enabled() {
            Some(Arc::new(
                TieredCacheManager::<ApiResponse>::from_config(cache_config).await?,
            ))
        } else {
            None
        };
        let governor = Arc::new(UsageGovernor::from_config(config.usage()).await?);
        info!(cache = cache.is_some(), "Client context ready");

        Ok(Self {
            cache,
            governor: Some(governor),
            retry: config.retry().clone(),
        })
    }

    /// Shared cache, if any.
    pub fn cache(&self) -> Option<&Arc<TieredCacheManager<ApiResponse>>> {
        self.cache.as_ref()
    }

    /// Shared governor, if any.
    pub fn governor(&self) -> Option<&Arc<UsageGovernor>> {
        self.governor.as_ref()
    }

    /// Retry settings for new clients.
    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }
}
