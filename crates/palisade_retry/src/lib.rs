//! Exponential backoff retry for asynchronous operations.
//!
//! A [`RetryPolicy`] decides *whether* to retry (by error classification or by a
//! predicate over a successful result) and *how long* to wait
//! (`min(base_delay * backoff_factor^(attempt-1), max_delay)`).
//! [`RetryExecutor`] holds a policy that can be changed at runtime, and
//! [`Retrying`] wraps an operation into a drop-in retrying replacement.
//!
//! An invocation makes at most `retry_count + 1` attempts. When attempts run
//! out, the last error is returned; if the last attempt *succeeded* but the
//! result predicate still asked for a retry, that result is returned as-is.
//!
//! Back-off sleeps are ordinary await points: dropping the future cancels the
//! retry loop.
//!
//! # Example
//!
//! ```
//! use palisade_error::{TransportError, TransportErrorKind};
//! use palisade_retry::{RetryConfig, RetryPolicy};
//! use std::sync::atomic::{AtomicU32, Ordering};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let policy: RetryPolicy<&str> = RetryPolicy::new(
//!     RetryConfig::default().with_base_delay(0.0).with_max_delay(0.0),
//! );
//! let calls = AtomicU32::new(0);
//!
//! let result = policy
//!     .retry(|| {
//!         let n = calls.fetch_add(1, Ordering::SeqCst);
//!         async move {
//!             if n < 2 {
//!                 Err(TransportError::new(TransportErrorKind::Timeout("slow".into())))
//!             } else {
//!                 Ok("done")
//!             }
//!         }
//!     })
//!     .await;
//!
//! assert_eq!(result.unwrap(), "done");
//! assert_eq!(calls.load(Ordering::SeqCst), 3);
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod executor;
mod policy;

pub use config::RetryConfig;
pub use executor::{RetryExecutor, Retrying};
pub use policy::{ResultPredicate, RetryPolicy};
