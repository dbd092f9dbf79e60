//! Top-level error wrapper types.

use crate::{ConfigError, StorageError, TransportError, UsageLimitError};

/// Every error the Palisade crates can surface.
///
/// # Examples
///
/// ```
/// use palisade_error::{PalisadeError, ConfigError};
///
/// let err: PalisadeError = ConfigError::new("bad ttl").into();
/// assert!(format!("{}", err).contains("Configuration Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum PalisadeErrorKind {
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Cache or usage file storage error
    #[from(StorageError)]
    Storage(StorageError),
    /// Outbound transport error
    #[from(TransportError)]
    Transport(TransportError),
    /// Call blocked by a usage quota
    #[from(UsageLimitError)]
    UsageLimit(UsageLimitError),
}

/// Palisade error with kind discrimination.
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Palisade Error: {}", _0)]
pub struct PalisadeError(Box<PalisadeErrorKind>);

impl PalisadeError {
    /// Create a new error from a kind.
    pub fn new(kind: PalisadeErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &PalisadeErrorKind {
        &self.0
    }
}

// Generic From implementation for any type that converts to PalisadeErrorKind
impl<T> From<T> for PalisadeError
where
    T: Into<PalisadeErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Palisade operations.
pub type PalisadeResult<T> = std::result::Result<T, PalisadeError>;
