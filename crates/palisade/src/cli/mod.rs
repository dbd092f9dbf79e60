//! Command-line interface module.
//!
//! This module provides the CLI structure and command handlers for the palisade binary.

mod cache;
mod commands;
mod usage;

pub use cache::handle_cache_command;
pub use commands::{Cli, Commands};
pub use usage::{clear, prune, set_cost, set_limit, show_stats};
