//! Retry executor tests.
//!
//! Time is paused, so back-off sleeps advance the clock instantly and
//! elapsed time equals the sum of the scheduled delays.

use palisade_error::{FailureKind, TransportError, TransportErrorKind};
use palisade_retry::{RetryConfig, RetryExecutor, RetryPolicy};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::Instant;

fn timeout() -> TransportError {
    TransportError::new(TransportErrorKind::Timeout("deadline exceeded".to_string()))
}

fn status(status_code: u16) -> TransportError {
    TransportError::new(TransportErrorKind::Status {
        status_code,
        message: "upstream".to_string(),
    })
}

#[test]
fn test_default_schedule_is_capped_exponential() {
    let config = RetryConfig::default().with_retry_count(5);
    let secs: Vec<u64> = config.schedule().iter().map(Duration::as_secs).collect();
    assert_eq!(secs, vec![1, 2, 4, 8, 10]);
}

#[test]
fn test_delay_uses_factor_and_base() {
    let config = RetryConfig::default()
        .with_base_delay(0.5)
        .with_backoff_factor(3.0)
        .with_max_delay(100.0);
    assert_eq!(config.delay_for_attempt(1), Duration::from_millis(500));
    assert_eq!(config.delay_for_attempt(2), Duration::from_millis(1500));
    assert_eq!(config.delay_for_attempt(3), Duration::from_millis(4500));
}

#[test]
fn test_config_defaults_from_empty_document() {
    let config: RetryConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config, RetryConfig::default());
    assert_eq!(*config.retry_count(), 3);
    assert!(config.retries(FailureKind::Connection));
    assert!(config.retries(FailureKind::Timeout));
    assert!(!config.retries(FailureKind::ServerError));
}

#[test]
fn test_config_validation() {
    assert!(RetryConfig::default().validate().is_ok());
    assert!(RetryConfig::default().with_base_delay(-1.0).validate().is_err());
    assert!(RetryConfig::default().with_backoff_factor(0.0).validate().is_err());
    assert!(RetryConfig::default().with_max_delay(f64::NAN).validate().is_err());
}

#[test]
fn test_update_overrides_only_given_fields() {
    let mut config = RetryConfig::default();
    config.update(Some(5), None, Some(30.0), None);
    assert_eq!(*config.retry_count(), 5);
    assert_eq!(*config.base_delay(), 1.0);
    assert_eq!(*config.max_delay(), 30.0);
    assert_eq!(*config.backoff_factor(), 2.0);
}

#[tokio::test(start_paused = true)]
async fn test_succeeds_after_transient_failures() {
    let policy: RetryPolicy<&str> = RetryPolicy::default();
    let calls = AtomicU32::new(0);
    let start = Instant::now();

    let result = policy
        .retry(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { if n < 2 { Err(timeout()) } else { Ok("ok") } }
        })
        .await;

    assert_eq!(result.unwrap(), "ok");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(3), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(3100), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_exhaustion_returns_last_error() {
    let policy: RetryPolicy<()> = RetryPolicy::default();
    let calls = AtomicU32::new(0);
    let start = Instant::now();

    let result = policy
        .retry(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(timeout()) }
        })
        .await;

    let err = result.unwrap_err();
    assert!(matches!(err.kind, TransportErrorKind::Timeout(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert!(start.elapsed() >= Duration::from_secs(7));
}

#[tokio::test(start_paused = true)]
async fn test_non_retryable_error_fails_immediately() {
    let policy: RetryPolicy<()> = RetryPolicy::new(RetryConfig::transient());
    let calls = AtomicU32::new(0);
    let start = Instant::now();

    let result = policy
        .retry(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(status(404)) }
        })
        .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_transient_config_retries_throttling_and_server_errors() {
    let policy: RetryPolicy<u16> = RetryPolicy::new(RetryConfig::transient());
    let calls = AtomicU32::new(0);

    let result = policy
        .retry(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                match n {
                    0 => Err(status(429)),
                    1 => Err(status(503)),
                    _ => Ok(200),
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), 200);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_default_config_does_not_retry_server_errors() {
    let policy: RetryPolicy<()> = RetryPolicy::default();
    let calls = AtomicU32::new(0);

    let result = policy
        .retry(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(status(500)) }
        })
        .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_zero_retries_makes_single_attempt() {
    let policy: RetryPolicy<()> = RetryPolicy::new(RetryConfig::default().with_retry_count(0));
    let calls = AtomicU32::new(0);

    let result = policy
        .retry(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(timeout()) }
        })
        .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_result_predicate_retries_until_satisfied() {
    let policy: RetryPolicy<u32> =
        RetryPolicy::default().with_retry_on_result(|value: &u32| *value == 0);
    let calls = AtomicU32::new(0);

    let result = policy
        .retry(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, TransportError>(if n < 2 { 0 } else { 42 }) }
        })
        .await;

    assert_eq!(result.unwrap(), 42);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_result_predicate_exhaustion_returns_last_result() {
    let policy: RetryPolicy<u32> = RetryPolicy::new(RetryConfig::default().with_retry_count(2))
        .with_retry_on_result(|value: &u32| *value < 100);
    let calls = AtomicU32::new(0);

    let result = policy
        .retry(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, TransportError>(n) }
        })
        .await;

    assert_eq!(result.unwrap(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_io_errors_are_classified() {
    let policy: RetryPolicy<()> = RetryPolicy::new(RetryConfig::default().with_retry_count(1));
    let calls = AtomicU32::new(0);

    let result = policy
        .retry(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<(), _>(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "refused",
                ))
            }
        })
        .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_executor_reconfiguration_applies_to_later_calls() {
    let executor: RetryExecutor<()> = RetryExecutor::default();
    let calls = Arc::new(AtomicU32::new(0));

    executor
        .set_config(RetryConfig::default().with_retry_count(1))
        .await
        .unwrap();

    let counter = Arc::clone(&calls);
    let result = executor
        .retry(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(timeout()) }
        })
        .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(*executor.config().await.retry_count(), 1);
}

#[tokio::test]
async fn test_executor_rejects_invalid_config() {
    let executor: RetryExecutor<()> = RetryExecutor::default();
    let result = executor
        .set_config(RetryConfig::default().with_backoff_factor(-2.0))
        .await;

    assert!(result.is_err());
    assert_eq!(*executor.config().await.backoff_factor(), 2.0);
}

#[tokio::test(start_paused = true)]
async fn test_wrapped_operation_retries_on_call() {
    let executor: RetryExecutor<&str> = RetryExecutor::default();
    let calls = AtomicU32::new(0);
    let fetch = executor.wrap(|| {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        async move { if n == 0 { Err(timeout()) } else { Ok("fetched") } }
    });

    assert_eq!(fetch.call().await.unwrap(), "fetched");
    assert_eq!(fetch.call().await.unwrap(), "fetched");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}
