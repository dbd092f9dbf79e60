//! Runtime-adjustable retry executor and the retrying decorator.

use crate::{ResultPredicate, RetryConfig, RetryPolicy};
use palisade_error::{PalisadeResult, RetryableError};
use std::fmt;
use std::future::Future;
use tokio::sync::RwLock;
use tracing::info;

/// Holds a [`RetryPolicy`] that can be replaced while the executor is shared.
///
/// Each call to [`retry`](Self::retry) snapshots the policy when it starts, so
/// a reconfiguration affects subsequent invocations only.
pub struct RetryExecutor<T> {
    policy: RwLock<RetryPolicy<T>>,
}

impl<T> fmt::Debug for RetryExecutor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor").finish_non_exhaustive()
    }
}

impl<T> Default for RetryExecutor<T> {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl<T> RetryExecutor<T> {
    /// Executor starting with `policy`.
    pub fn new(policy: RetryPolicy<T>) -> Self {
        Self {
            policy: RwLock::new(policy),
        }
    }

    /// Snapshot of the current policy.
    pub async fn policy(&self) -> RetryPolicy<T> {
        self.policy.read().await.clone()
    }

    /// Snapshot of the current settings.
    pub async fn config(&self) -> RetryConfig {
        self.policy.read().await.config().clone()
    }

    /// Replace the whole policy.
    pub async fn set_policy(&self, policy: RetryPolicy<T>) {
        *self.policy.write().await = policy;
    }

    /// Replace the settings after validating them.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the new settings are invalid; the
    /// current settings are kept.
    pub async fn set_config(&self, config: RetryConfig) -> PalisadeResult<()> {
        config.validate()?;
        info!(
            retry_count = config.retry_count(),
            base_delay = config.base_delay(),
            max_delay = config.max_delay(),
            backoff_factor = config.backoff_factor(),
            "Retry configuration updated"
        );
        *self.policy.write().await.config_mut() = config;
        Ok(())
    }

    /// Replace (or remove) the result predicate.
    pub async fn set_retry_on_result(&self, predicate: Option<ResultPredicate<T>>) {
        self.policy.write().await.set_retry_on_result(predicate);
    }

    /// Run `operation` under the current policy.
    ///
    /// # Errors
    ///
    /// See [`RetryPolicy::retry`].
    pub async fn retry<F, Fut, E>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError + fmt::Display,
    {
        let policy = self.policy().await;
        policy.retry(operation).await
    }

    /// Wrap `operation` into a [`Retrying`] that shares this executor's policy.
    pub fn wrap<F>(&self, operation: F) -> Retrying<'_, T, F> {
        Retrying {
            executor: self,
            operation,
        }
    }
}

/// An operation bundled with the executor that retries it.
///
/// Calling it is a drop-in replacement for calling the operation directly.
///
/// # Example
///
/// ```
/// use palisade_error::{TransportError, TransportErrorKind};
/// use palisade_retry::{RetryConfig, RetryExecutor, RetryPolicy};
///
/// # #[tokio::main]
/// # async fn main() {
/// let executor: RetryExecutor<u32> =
///     RetryExecutor::new(RetryPolicy::new(RetryConfig::default().with_retry_count(0)));
/// let fetch = executor.wrap(|| async { Ok::<_, TransportError>(7) });
///
/// assert_eq!(fetch.call().await.unwrap(), 7);
/// # }
/// ```
pub struct Retrying<'a, T, F> {
    executor: &'a RetryExecutor<T>,
    operation: F,
}

impl<T, F, Fut, E> Retrying<'_, T, F>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError + fmt::Display,
{
    /// Invoke the wrapped operation with retries.
    ///
    /// # Errors
    ///
    /// See [`RetryPolicy::retry`].
    pub async fn call(&self) -> Result<T, E> {
        self.executor.retry(&self.operation).await
    }
}
