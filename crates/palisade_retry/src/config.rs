//! Serializable retry settings.

use derive_getters::Getters;
use palisade_error::{ConfigError, FailureKind, PalisadeResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Retry counts, delays and retryable failure kinds.
///
/// Delays are in seconds.
///
/// # Example
///
/// ```toml
/// [retry]
/// retry_count = 3
/// base_delay = 1.0
/// max_delay = 10.0
/// backoff_factor = 2.0
/// retry_on = ["connection", "timeout", "rate_limited", "server_error"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, derive_setters::Setters)]
#[setters(prefix = "with_")]
pub struct RetryConfig {
    /// Retries after the initial attempt
    #[serde(default = "default_retry_count")]
    retry_count: u32,

    /// Delay before the first retry, in seconds
    #[serde(default = "default_base_delay")]
    base_delay: f64,

    /// Upper bound for any single delay, in seconds
    #[serde(default = "default_max_delay")]
    max_delay: f64,

    /// Multiplier applied per attempt
    #[serde(default = "default_backoff_factor")]
    backoff_factor: f64,

    /// Failure kinds that trigger a retry
    #[serde(default = "default_retry_on")]
    retry_on: BTreeSet<FailureKind>,

    /// Randomize each delay to spread out concurrent retries
    #[serde(default)]
    jitter: bool,
}

fn default_retry_count() -> u32 {
    3
}

fn default_base_delay() -> f64 {
    1.0
}

fn default_max_delay() -> f64 {
    10.0
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_retry_on() -> BTreeSet<FailureKind> {
    FailureKind::default_retryable().into_iter().collect()
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retry_count: default_retry_count(),
            base_delay: default_base_delay(),
            max_delay: default_max_delay(),
            backoff_factor: default_backoff_factor(),
            retry_on: default_retry_on(),
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// Settings used by outbound API clients: defaults plus 429 and 5xx retries.
    pub fn transient() -> Self {
        Self::default().with_retry_on(FailureKind::transient().into_iter().collect())
    }

    /// Delay before retry number `attempt` (1-based).
    ///
    /// Pure function of the configuration: `min(base_delay * backoff_factor^(attempt-1), max_delay)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use palisade_retry::RetryConfig;
    /// use std::time::Duration;
    ///
    /// let config = RetryConfig::default();
    /// assert_eq!(config.delay_for_attempt(1), Duration::from_secs(1));
    /// assert_eq!(config.delay_for_attempt(3), Duration::from_secs(4));
    /// assert_eq!(config.delay_for_attempt(10), Duration::from_secs(10));
    /// ```
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let raw = self.base_delay * self.backoff_factor.powi(exponent);
        let secs = raw.min(self.max_delay);
        Duration::try_from_secs_f64(secs).unwrap_or_else(|_| {
            Duration::try_from_secs_f64(self.max_delay).unwrap_or(Duration::ZERO)
        })
    }

    /// The full back-off schedule: one delay per permitted retry.
    pub fn schedule(&self) -> Vec<Duration> {
        (1..=self.retry_count)
            .map(|attempt| self.delay_for_attempt(attempt))
            .collect()
    }

    /// Whether failures of `kind` are retried.
    pub fn retries(&self, kind: FailureKind) -> bool {
        self.retry_on.contains(&kind)
    }

    /// Override selected numeric settings, leaving `None` fields untouched.
    pub fn update(
        &mut self,
        retry_count: Option<u32>,
        base_delay: Option<f64>,
        max_delay: Option<f64>,
        backoff_factor: Option<f64>,
    ) {
        if let Some(retry_count) = retry_count {
            self.retry_count = retry_count;
        }
        if let Some(base_delay) = base_delay {
            self.base_delay = base_delay;
        }
        if let Some(max_delay) = max_delay {
            self.max_delay = max_delay;
        }
        if let Some(backoff_factor) = backoff_factor {
            self.backoff_factor = backoff_factor;
        }
    }

    /// Validates delays and backoff factor.
    ///
    /// # Errors
    ///
    /// Returns an error if a delay is negative or `backoff_factor` is not positive.
    pub fn validate(&self) -> PalisadeResult<()> {
        let negative = |secs: f64| secs.is_nan() || secs < 0.0;
        if negative(self.base_delay) || negative(self.max_delay) {
            Err(ConfigError::new(format!(
                "retry delays must be non-negative, got base {} max {}",
                self.base_delay, self.max_delay
            )))?
        }
        if self.backoff_factor.is_nan() || self.backoff_factor <= 0.0 {
            Err(ConfigError::new(format!(
                "backoff_factor must be positive, got {}",
                self.backoff_factor
            )))?
        }
        Ok(())
    }
}
