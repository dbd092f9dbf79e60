//! CLI command definitions.

use clap::{Parser, Subcommand, ValueEnum};
use palisade::LimitKind;
use std::path::PathBuf;
use std::str::FromStr;

/// Palisade - inspect and administer API usage data and response caches
#[derive(Parser, Debug)]
#[command(name = "palisade")]
#[command(about = "Inspect and administer API usage data and response caches", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to layered lookup)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Export spans through OpenTelemetry (stdout exporter)
    #[arg(long, global = true)]
    pub otel: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show usage statistics
    Stats {
        /// Only this service
        #[arg(long)]
        service: Option<String>,

        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,

        /// Also write the report as JSON to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Set or remove a call-count limit
    Limit {
        /// Service name
        service: String,

        /// Limit window
        #[arg(value_parser = parse_limit_kind)]
        kind: LimitKind,

        /// Maximum number of calls, or "none" to remove the limit
        value: LimitValue,
    },

    /// Set per-call cost and monthly budget, or show them when no option is given
    Cost {
        /// Service name
        service: String,

        /// Cost charged per call without an explicit cost
        #[arg(long)]
        per_call: Option<f64>,

        /// Monthly budget in dollars
        #[arg(long)]
        budget: Option<f64>,
    },

    /// Zero usage counters, keeping limits and cost settings
    Clear {
        /// Only this service
        #[arg(long)]
        service: Option<String>,
    },

    /// Drop hourly and daily buckets older than a number of days
    Prune {
        /// Age threshold in days
        #[arg(long, default_value = "90")]
        days: u32,
    },

    /// Response cache commands
    #[command(subcommand)]
    Cache(CacheCommands),
}

/// Response cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show per-tier statistics
    Stats {
        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },

    /// Remove every cached response
    Clear,
}

/// Output format options
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum OutputFormat {
    /// Human-readable format
    Human,
    /// JSON format
    Json,
}

/// A limit value: a call count, or `none` for unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitValue(pub Option<u64>);

impl FromStr for LimitValue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("none") {
            return Ok(Self(None));
        }
        s.parse::<u64>()
            .map(|value| Self(Some(value)))
            .map_err(|_| format!("expected a number or \"none\", got '{}'", s))
    }
}

fn parse_limit_kind(s: &str) -> Result<LimitKind, String> {
    LimitKind::from_str(&s.to_lowercase())
        .map_err(|_| format!("expected hourly, daily, monthly or total, got '{}'", s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_otel_flag_is_global() {
        let cli = Cli::try_parse_from(["palisade", "cache", "stats", "--otel"]).unwrap();
        assert!(cli.otel);
        assert!(!Cli::try_parse_from(["palisade", "prune"]).unwrap().otel);
    }

    #[test]
    fn test_limit_arguments() {
        let cli = Cli::try_parse_from(["palisade", "limit", "openai", "Daily", "5000"]).unwrap();
        match cli.command {
            Commands::Limit {
                service,
                kind,
                value,
            } => {
                assert_eq!(service, "openai");
                assert_eq!(kind, LimitKind::Daily);
                assert_eq!(value, LimitValue(Some(5000)));
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let cli = Cli::try_parse_from(["palisade", "limit", "openai", "hourly", "none"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Limit {
                value: LimitValue(None),
                ..
            }
        ));

        assert!(Cli::try_parse_from(["palisade", "limit", "openai", "weekly", "5"]).is_err());
        assert!(Cli::try_parse_from(["palisade", "limit", "openai", "daily", "-5"]).is_err());
    }

    #[test]
    fn test_prune_default_days() {
        let cli = Cli::try_parse_from(["palisade", "prune"]).unwrap();
        assert!(matches!(cli.command, Commands::Prune { days: 90 }));
    }
}
