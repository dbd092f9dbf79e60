//! Error types for the Palisade resilience layer.
//!
//! This crate provides the foundation error types used throughout the Palisade workspace.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! Errors that may be retried implement [`RetryableError`], which classifies
//! them into a [`FailureKind`]. Retry policies hold a set of failure kinds
//! they are willing to retry.
//!
//! # Examples
//!
//! ```
//! use palisade_error::{PalisadeResult, ConfigError};
//!
//! fn check_size(max_size: usize) -> PalisadeResult<usize> {
//!     if max_size == 0 {
//!         Err(ConfigError::new("max_size must be greater than zero"))?
//!     }
//!     Ok(max_size)
//! }
//!
//! assert!(check_size(0).is_err());
//! assert_eq!(check_size(10).unwrap(), 10);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod retry;
mod storage;
mod transport;
mod usage;

pub use config::ConfigError;
pub use error::{PalisadeError, PalisadeErrorKind, PalisadeResult};
pub use retry::{FailureKind, RetryableError};
pub use storage::{StorageError, StorageErrorKind};
pub use transport::{TransportError, TransportErrorKind};
pub use usage::{ExceededLimit, UsageLimitError};
