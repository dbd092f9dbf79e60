//! The description of one call handed to the governor.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Token counts reported for one call.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Getters, derive_setters::Setters,
)]
#[setters(prefix = "with_", strip_option)]
pub struct Tokens {
    /// Prompt (input) tokens
    prompt: Option<u64>,
    /// Completion (output) tokens
    completion: Option<u64>,
    /// Total tokens, if reported
    total: Option<u64>,
}

impl Tokens {
    /// Prompt and completion counts, total derived.
    pub fn new(prompt: u64, completion: u64) -> Self {
        Self {
            prompt: Some(prompt),
            completion: Some(completion),
            total: None,
        }
    }

    /// Reported total, or prompt + completion when both are present.
    ///
    /// # Examples
    ///
    /// ```
    /// use palisade_usage::Tokens;
    ///
    /// assert_eq!(Tokens::new(12, 30).effective_total(), Some(42));
    /// assert_eq!(Tokens::default().with_prompt(12).effective_total(), None);
    /// assert_eq!(Tokens::new(1, 2).with_total(10).effective_total(), Some(10));
    /// assert_eq!(Tokens::new(u64::MAX, 1).effective_total(), Some(u64::MAX));
    /// ```
    pub fn effective_total(&self) -> Option<u64> {
        match (self.total, self.prompt, self.completion) {
            (Some(total), _, _) => Some(total),
            (None, Some(prompt), Some(completion)) => Some(prompt.saturating_add(completion)),
            _ => None,
        }
    }

    /// Whether no count is present.
    pub fn is_empty(&self) -> bool {
        self.prompt.is_none() && self.completion.is_none() && self.total.is_none()
    }
}

/// One outbound call to be recorded.
///
/// # Example
///
/// ```
/// use palisade_usage::{CallRecord, Tokens};
/// use std::time::Duration;
///
/// let call = CallRecord::new("/v1/chat/completions", true)
///     .with_tokens(Tokens::new(100, 20))
///     .with_cost(0.002)
///     .with_duration(Duration::from_millis(850));
/// assert_eq!(*call.cost(), Some(0.002));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Getters, derive_setters::Setters)]
#[setters(prefix = "with_")]
pub struct CallRecord {
    /// Endpoint called
    #[setters(skip)]
    endpoint: String,
    /// Whether the call succeeded
    #[setters(skip)]
    success: bool,
    /// Tokens consumed
    #[setters(strip_option)]
    tokens: Option<Tokens>,
    /// Explicit cost; falls back to the service's `cost_per_call`
    #[setters(strip_option)]
    cost: Option<f64>,
    /// Wall-clock duration
    #[setters(strip_option)]
    duration: Option<Duration>,
    /// Free-form details kept with the service's last call
    metadata: BTreeMap<String, Value>,
}

impl CallRecord {
    /// A call to `endpoint` that succeeded or failed.
    pub fn new(endpoint: impl Into<String>, success: bool) -> Self {
        Self {
            endpoint: endpoint.into(),
            success,
            ..Self::default()
        }
    }

    /// Add one metadata entry.
    pub fn with_metadata_entry(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
