//! Palisade - resilience for outbound API calls
//!
//! Palisade puts a fixed set of protections around every call an
//! application makes to a third-party API: a memory-then-disk response
//! cache, exponential-backoff retries and per-service quotas with cost
//! accounting.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use palisade::{ApiRequest, ClientContext, HttpTransport, PalisadeConfig, ResilientClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PalisadeConfig::load()?;
//!     let context = ClientContext::from_config(&config).await?;
//!     let transport = HttpTransport::new(Some("https://api.example.com".to_string()))?
//!         .with_api_key(std::env::var("EXAMPLE_API_KEY")?);
//!
//!     let client = ResilientClient::with_context("Example", transport, &context);
//!     let response = client
//!         .request(ApiRequest::get("/v1/search").with_param("q", "rust"))
//!         .await?;
//!     println!("{}", response.body());
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `palisade_error` - Error types and failure classification
//! - `palisade_cache` - Memory and disk cache tiers and the tiered manager
//! - `palisade_retry` - Retry configuration, policy and executor
//! - `palisade_usage` - Usage governor, records and reports
//! - `palisade_client` - The resilient client pipeline, transports and configuration
//!
//! This crate re-exports everything for convenience, and ships the
//! `palisade` binary for inspecting and administering usage data and caches.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod display;

pub use display::{format_cost, format_count, render_cache_stats, render_report};

pub use palisade_cache::*;
pub use palisade_client::*;
pub use palisade_error::*;
pub use palisade_retry::*;
pub use palisade_usage::*;
