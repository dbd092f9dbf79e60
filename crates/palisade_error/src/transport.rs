//! Transport error types for outbound API calls.

use crate::{FailureKind, RetryableError};

/// Transport-level failure conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum TransportErrorKind {
    /// Could not establish or keep a connection
    #[display("Connection failed: {}", _0)]
    Connection(String),
    /// Request timed out
    #[display("Request timed out: {}", _0)]
    Timeout(String),
    /// Upstream answered with a non-success status
    #[display("HTTP {} error: {}", status_code, message)]
    Status {
        /// HTTP status code
        status_code: u16,
        /// Error message or response body
        message: String,
    },
    /// Response body could not be decoded
    #[display("Failed to decode response: {}", _0)]
    Decode(String),
    /// Client construction or any other failure
    #[display("Transport failure: {}", _0)]
    Other(String),
}

impl TransportErrorKind {
    /// Classify this failure for retry decisions.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            TransportErrorKind::Connection(_) => FailureKind::Connection,
            TransportErrorKind::Timeout(_) => FailureKind::Timeout,
            TransportErrorKind::Status { status_code, .. } => FailureKind::from_status(*status_code),
            TransportErrorKind::Decode(_) | TransportErrorKind::Other(_) => FailureKind::Other,
        }
    }
}

/// Transport error with source location tracking.
///
/// # Examples
///
/// ```
/// use palisade_error::{TransportError, TransportErrorKind};
///
/// let err = TransportError::new(TransportErrorKind::Timeout("read".to_string()));
/// assert!(format!("{}", err).contains("timed out"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Transport Error: {} at line {} in {}", kind, line, file)]
pub struct TransportError {
    /// The kind of error that occurred
    pub kind: TransportErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl TransportError {
    /// Create a new TransportError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: TransportErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

impl RetryableError for TransportError {
    fn failure_kind(&self) -> FailureKind {
        self.kind.failure_kind()
    }
}
