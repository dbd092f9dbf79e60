//! Usage governor configuration.

use derive_getters::Getters;
use palisade_error::{ConfigError, PalisadeResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Where and how often usage data is saved, plus preconfigured quotas.
///
/// # Example
///
/// ```toml
/// [usage]
/// auto_save = true
/// save_interval_secs = 60
///
/// [usage.services.openai]
/// hourly = 500
/// monthly_budget = 50.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, derive_setters::Setters)]
#[setters(prefix = "with_")]
pub struct UsageConfig {
    /// Directory holding `<service>.json` files; defaults to `~/.palisade/usage`
    #[serde(default)]
    data_dir: Option<PathBuf>,

    /// Save periodically from `record_call`
    #[serde(default = "default_auto_save")]
    auto_save: bool,

    /// Minimum seconds between automatic saves
    #[serde(default = "default_save_interval_secs")]
    save_interval_secs: u64,

    /// Quotas applied at startup, keyed by service name
    #[serde(default)]
    services: BTreeMap<String, ServiceQuota>,
}

fn default_auto_save() -> bool {
    true
}

fn default_save_interval_secs() -> u64 {
    60
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            auto_save: default_auto_save(),
            save_interval_secs: default_save_interval_secs(),
            services: BTreeMap::new(),
        }
    }
}

impl UsageConfig {
    /// Configured directory, or the default location.
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_usage_dir)
    }

    /// Interval between automatic saves.
    pub fn save_interval(&self) -> Duration {
        Duration::from_secs(self.save_interval_secs)
    }

    /// Validates every service quota.
    ///
    /// # Errors
    ///
    /// Returns an error if a cost or budget is negative.
    pub fn validate(&self) -> PalisadeResult<()> {
        for (service, quota) in &self.services {
            quota.validate().map_err(|e| {
                ConfigError::new(format!("usage.services.{}: {}", service, e))
            })?;
        }
        Ok(())
    }
}

/// Limits and cost settings for one service.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, Getters, derive_setters::Setters,
)]
#[setters(prefix = "with_", strip_option)]
#[serde(default)]
pub struct ServiceQuota {
    /// Calls per hour
    hourly: Option<u64>,
    /// Calls per day
    daily: Option<u64>,
    /// Calls per month
    monthly: Option<u64>,
    /// Calls overall
    total: Option<u64>,
    /// Cost charged per call without an explicit cost
    cost_per_call: Option<f64>,
    /// Monthly spending ceiling
    monthly_budget: Option<f64>,
}

impl ServiceQuota {
    /// Rejects negative costs.
    ///
    /// # Errors
    ///
    /// Returns a message naming the offending field.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(cost) = self.cost_per_call
            && (!cost.is_finite() || cost < 0.0)
        {
            return Err(format!(
                "cost_per_call must be finite and non-negative, got {}",
                cost
            ));
        }
        if let Some(budget) = self.monthly_budget
            && (!budget.is_finite() || budget < 0.0)
        {
            return Err(format!(
                "monthly_budget must be finite and non-negative, got {}",
                budget
            ));
        }
        Ok(())
    }
}

/// Default usage directory: `~/.palisade/usage`.
pub fn default_usage_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".palisade")
        .join("usage")
}
