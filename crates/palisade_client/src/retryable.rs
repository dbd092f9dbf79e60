//! Retry classification for API calls.

use crate::ApiResponse;
use palisade_error::{FailureKind, RetryableError, TransportError, TransportErrorKind};
use std::fmt;

/// Status codes that are retried.
pub const RETRYABLE_STATUS_CODES: [u16; 5] = [429, 500, 502, 503, 504];

/// Error-message fragments (matched case-insensitively) that mark a failure as transient.
pub const RETRYABLE_KEYWORDS: [&str; 7] = [
    "timeout",
    "rate limit",
    "too many requests",
    "server error",
    "service unavailable",
    "network",
    "connection",
];

/// Failure kind implied by an error message, if it contains a retryable keyword.
pub fn kind_from_message(message: &str) -> Option<FailureKind> {
    let message = message.to_lowercase();
    let keyword = RETRYABLE_KEYWORDS
        .iter()
        .find(|keyword| message.contains(*keyword))?;
    Some(match *keyword {
        "timeout" => FailureKind::Timeout,
        "rate limit" | "too many requests" => FailureKind::RateLimited,
        "server error" | "service unavailable" => FailureKind::ServerError,
        _ => FailureKind::Connection,
    })
}

/// Classify a transport failure for the client's retry policy.
///
/// Only the statuses in [`RETRYABLE_STATUS_CODES`] map to transient kinds;
/// free-form failures are classified by [`RETRYABLE_KEYWORDS`].
///
/// # Examples
///
/// ```
/// use palisade_client::classify;
/// use palisade_error::{FailureKind, TransportError, TransportErrorKind};
///
/// let status = |status_code| TransportError::new(TransportErrorKind::Status {
///     status_code,
///     message: String::new(),
/// });
/// assert_eq!(classify(&status(503)), FailureKind::ServerError);
/// assert_eq!(classify(&status(501)), FailureKind::Other);
/// assert_eq!(classify(&status(404)), FailureKind::ClientError);
///
/// let other = TransportError::new(TransportErrorKind::Other("Rate limit hit".into()));
/// assert_eq!(classify(&other), FailureKind::RateLimited);
/// ```
pub fn classify(error: &TransportError) -> FailureKind {
    match &error.kind {
        TransportErrorKind::Connection(_) => FailureKind::Connection,
        TransportErrorKind::Timeout(_) => FailureKind::Timeout,
        TransportErrorKind::Status { status_code, .. } => {
            if RETRYABLE_STATUS_CODES.contains(status_code) {
                FailureKind::from_status(*status_code)
            } else if (400..500).contains(status_code) {
                FailureKind::ClientError
            } else {
                FailureKind::Other
            }
        }
        TransportErrorKind::Decode(_) => FailureKind::Other,
        TransportErrorKind::Other(message) => {
            kind_from_message(message).unwrap_or(FailureKind::Other)
        }
    }
}

/// Whether an unsuccessful response should be retried.
///
/// True for a retryable status, or an error message containing a retryable keyword.
pub fn should_retry_response(response: &ApiResponse) -> bool {
    if response.is_success() {
        return false;
    }
    RETRYABLE_STATUS_CODES.contains(response.status())
        || response
            .error_message()
            .is_some_and(|message| kind_from_message(&message).is_some())
}

/// A transport failure seen through the client's classification.
pub(crate) struct Attempt(pub(crate) TransportError);

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl RetryableError for Attempt {
    fn failure_kind(&self) -> FailureKind {
        classify(&self.0)
    }
}
