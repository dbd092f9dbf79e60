//! Quota errors raised when a governed service is over its limits.

use serde::{Deserialize, Serialize};

/// The limit a service has reached.
///
/// Returned by the usage governor as a sentinel; only the client pipeline
/// turns it into a [`UsageLimitError`].
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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExceededLimit {
    /// Calls in the current hour bucket
    Hourly,
    /// Calls in the current day bucket
    Daily,
    /// Calls in the current month bucket
    Monthly,
    /// Calls since the record was created or last cleared
    Total,
    /// Cost accumulated in the current month
    Budget,
}

/// A call was blocked before any network attempt because of a quota.
///
/// # Examples
///
/// ```
/// use palisade_error::{ExceededLimit, UsageLimitError};
///
/// let err = UsageLimitError::new("openai", ExceededLimit::Hourly);
/// assert!(format!("{}", err).contains("hourly"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display(
    "Usage Limit Error: {} exceeded its {} limit at line {} in {}",
    service,
    limit,
    line,
    file
)]
pub struct UsageLimitError {
    /// Service whose quota was exceeded
    pub service: String,
    /// Which limit tripped
    pub limit: ExceededLimit,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl UsageLimitError {
    /// Create a new UsageLimitError with automatic location tracking.
    #[track_caller]
    pub fn new(service: impl Into<String>, limit: ExceededLimit) -> Self {
        let location = std::panic::Location::caller();
        Self {
            service: service.into(),
            limit,
            line: location.line(),
            file: location.file(),
        }
    }
}
