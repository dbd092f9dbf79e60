//! Retry decisions and the retry loop.

use crate::RetryConfig;
use palisade_error::RetryableError;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio_retry2::strategy::jitter;
use tokio_retry2::{Retry, RetryError};
use tracing::{debug, warn};

/// Predicate over a successful result; `true` means "retry anyway".
pub type ResultPredicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Why a single attempt did not end the loop.
enum Rejected<T, E> {
    Failed(E),
    Unsatisfactory(T),
}

/// A [`RetryConfig`] plus an optional result predicate.
pub struct RetryPolicy<T> {
    config: RetryConfig,
    retry_on_result: Option<ResultPredicate<T>>,
}

impl<T> Clone for RetryPolicy<T> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            retry_on_result: self.retry_on_result.clone(),
        }
    }
}

impl<T> fmt::Debug for RetryPolicy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("config", &self.config)
            .field("retry_on_result", &self.retry_on_result.is_some())
            .finish()
    }
}

impl<T> Default for RetryPolicy<T> {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl<T> From<RetryConfig> for RetryPolicy<T> {
    fn from(config: RetryConfig) -> Self {
        Self::new(config)
    }
}

impl<T> RetryPolicy<T> {
    /// Policy without a result predicate.
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            retry_on_result: None,
        }
    }

    /// Also retry successful results for which `predicate` returns `true`.
    pub fn with_retry_on_result<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.retry_on_result = Some(Arc::new(predicate));
        self
    }

    /// Replace (or remove) the result predicate.
    pub fn set_retry_on_result(&mut self, predicate: Option<ResultPredicate<T>>) {
        self.retry_on_result = predicate;
    }

    /// Current settings.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Mutable access to the settings.
    pub fn config_mut(&mut self) -> &mut RetryConfig {
        &mut self.config
    }

    /// Whether an error of this classification should be retried.
    pub fn should_retry_error<E: RetryableError>(&self, error: &E) -> bool {
        self.config.retries(error.failure_kind())
    }

    /// Whether a successful result should be retried.
    pub fn should_retry_result(&self, result: &T) -> bool {
        self.retry_on_result
            .as_ref()
            .is_some_and(|predicate| predicate(result))
    }

    /// Run `operation` until it succeeds, fails permanently, or attempts run out.
    ///
    /// Makes at most `retry_count + 1` attempts. Errors whose kind is not in
    /// `retry_on` are returned immediately. When attempts run out on an
    /// unsatisfactory success, that last result is returned.
    ///
    /// # Errors
    ///
    /// Returns the operation's error when it is not retryable or retries are exhausted.
    pub async fn retry<F, Fut, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError + fmt::Display,
    {
        let mut schedule = self.config.schedule();
        if *self.config.jitter() {
            schedule = schedule.into_iter().map(jitter).collect();
        }
        let max_attempts = self.config.retry_count().saturating_add(1);
        let attempts = AtomicU32::new(0);

        let outcome = Retry::spawn(schedule, || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let pending = operation();
            let attempts_left = attempt < max_attempts;
            let next_delay = self.config.delay_for_attempt(attempt);
            async move {
                match pending.await {
                    Ok(value) if self.should_retry_result(&value) => {
                        if attempts_left {
                            warn!(
                                attempt,
                                max_attempts,
                                delay = ?next_delay,
                                "Result requested retry"
                            );
                        }
                        Err(RetryError::Transient {
                            err: Rejected::Unsatisfactory(value),
                            retry_after: None,
                        })
                    }
                    Ok(value) => {
                        if attempt > 1 {
                            debug!(attempt, "Operation succeeded after retry");
                        }
                        Ok(value)
                    }
                    Err(e) if self.should_retry_error(&e) => {
                        if attempts_left {
                            warn!(
                                attempt,
                                max_attempts,
                                kind = %e.failure_kind(),
                                delay = ?next_delay,
                                error = %e,
                                "Retryable failure"
                            );
                        } else {
                            warn!(attempt, error = %e, "Retries exhausted");
                        }
                        Err(RetryError::Transient {
                            err: Rejected::Failed(e),
                            retry_after: None,
                        })
                    }
                    Err(e) => {
                        debug!(attempt, kind = %e.failure_kind(), "Non-retryable failure");
                        Err(RetryError::Permanent(Rejected::Failed(e)))
                    }
                }
            }
        })
        .await;

        match outcome {
            Ok(value) => Ok(value),
            Err(Rejected::Failed(e)) => Err(e),
            Err(Rejected::Unsatisfactory(value)) => {
                debug!(max_attempts, "Returning last result after retries");
                Ok(value)
            }
        }
    }
}
