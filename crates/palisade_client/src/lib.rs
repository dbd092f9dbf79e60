//! Resilient API clients.
//!
//! [`ResilientClient`] wraps any [`Transport`] in a fixed pipeline: quota
//! preflight against a [`UsageGovernor`](palisade_usage::UsageGovernor),
//! lookup in a [`TieredCacheManager`](palisade_cache::TieredCacheManager),
//! execution under a [`RetryExecutor`](palisade_retry::RetryExecutor),
//! usage recording, and caching of successful responses.
//!
//! Shared state lives in a [`ClientContext`], built from a layered
//! [`PalisadeConfig`] or assembled by hand (which is how tests inject
//! temporary directories and fixed clocks).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod config;
mod context;
mod request;
mod retryable;
mod telemetry;
mod transport;

pub use client::{ClientOptions, ResilientClient, cache_key};
pub use config::PalisadeConfig;
pub use context::ClientContext;
pub use request::{ApiRequest, ApiResponse, Method};
pub use retryable::{
    RETRYABLE_KEYWORDS, RETRYABLE_STATUS_CODES, classify, kind_from_message,
    should_retry_response,
};
pub use telemetry::{TelemetryGuard, init_telemetry, shutdown_telemetry};
pub use transport::{DEFAULT_TIMEOUT, HttpTransport, Transport};
