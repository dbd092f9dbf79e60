//! Failure classification shared by the retry executor and its callers.

use serde::{Deserialize, Serialize};

/// Coarse classification of a failed operation.
///
/// Retry policies hold a set of these; an error is retried only when its
/// kind is in the set.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    /// Connection refused, reset, or otherwise unavailable
    Connection,
    /// Request or read timed out (including HTTP 408)
    Timeout,
    /// Upstream throttled the request (HTTP 429)
    RateLimited,
    /// Upstream reported a server-side failure (HTTP 5xx)
    ServerError,
    /// Upstream rejected the request (HTTP 4xx other than 408/429)
    ClientError,
    /// Anything else
    Other,
}

impl FailureKind {
    /// Classify an HTTP status code.
    ///
    /// # Examples
    ///
    /// ```
    /// use palisade_error::FailureKind;
    ///
    /// assert_eq!(FailureKind::from_status(429), FailureKind::RateLimited);
    /// assert_eq!(FailureKind::from_status(503), FailureKind::ServerError);
    /// assert_eq!(FailureKind::from_status(404), FailureKind::ClientError);
    /// ```
    pub fn from_status(status_code: u16) -> Self {
        match status_code {
            408 => FailureKind::Timeout,
            429 => FailureKind::RateLimited,
            500..=599 => FailureKind::ServerError,
            400..=499 => FailureKind::ClientError,
            _ => FailureKind::Other,
        }
    }

    /// The kinds retried when no explicit set is configured.
    pub fn default_retryable() -> Vec<FailureKind> {
        vec![FailureKind::Connection, FailureKind::Timeout]
    }

    /// The kinds an outbound API client retries: transport faults plus 429 and 5xx.
    pub fn transient() -> Vec<FailureKind> {
        vec![
            FailureKind::Connection,
            FailureKind::Timeout,
            FailureKind::RateLimited,
            FailureKind::ServerError,
        ]
    }
}

/// Trait for errors that can be classified for retry decisions.
///
/// # Examples
///
/// ```
/// use palisade_error::{FailureKind, RetryableError, TransportError, TransportErrorKind};
///
/// let err = TransportError::new(TransportErrorKind::Status {
///     status_code: 503,
///     message: "Service unavailable".to_string(),
/// });
/// assert_eq!(err.failure_kind(), FailureKind::ServerError);
/// ```
pub trait RetryableError {
    /// Classify this error.
    fn failure_kind(&self) -> FailureKind;
}

impl RetryableError for std::io::Error {
    fn failure_kind(&self) -> FailureKind {
        use std::io::ErrorKind;
        match self.kind() {
            ErrorKind::TimedOut => FailureKind::Timeout,
            ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::BrokenPipe => FailureKind::Connection,
            _ => FailureKind::Other,
        }
    }
}
