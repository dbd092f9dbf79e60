//! Palisade CLI binary.
//!
//! This binary provides command-line access to Palisade's persisted state:
//! - Show usage statistics per service
//! - Configure limits, per-call costs and budgets
//! - Clear or prune usage data
//! - Inspect and clear the response cache

use clap::Parser;
use palisade::{PalisadeConfig, UsageGovernor, init_telemetry};

mod cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use cli::{Cli, Commands, clear, handle_cache_command, prune, set_cost, set_limit, show_stats};

    // Parse command-line arguments
    let cli = Cli::parse();

    // Initialize tracing
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    let _telemetry = if cli.otel {
        Some(init_telemetry("palisade", &log_level.to_string().to_lowercase())?)
    } else {
        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
        None
    };

    let config = match &cli.config {
        Some(path) => PalisadeConfig::from_file(path)?,
        None => PalisadeConfig::load()?,
    };

    let governor = || UsageGovernor::from_config(config.usage());

    // Execute the requested command
    match cli.command {
        Commands::Stats {
            service,
            format,
            output,
        } => {
            show_stats(&governor().await?, service.as_deref(), format, output.as_deref()).await?;
        }

        Commands::Limit {
            service,
            kind,
            value,
        } => {
            set_limit(&governor().await?, &service, kind, value).await?;
        }

        Commands::Cost {
            service,
            per_call,
            budget,
        } => {
            set_cost(&governor().await?, &service, per_call, budget).await?;
        }

        Commands::Clear { service } => {
            clear(&governor().await?, service.as_deref()).await?;
        }

        Commands::Prune { days } => {
            prune(&governor().await?, days).await?;
        }

        Commands::Cache(cache_cmd) => {
            handle_cache_command(cache_cmd, config.cache()).await?;
        }
    }

    Ok(())
}
