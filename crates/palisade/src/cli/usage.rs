//! Usage data command handlers.

use super::commands::{LimitValue, OutputFormat};
use palisade::{
    ConfigError, LimitKind, PalisadeResult, StorageError, StorageErrorKind, UsageGovernor,
    UsageReport, format_cost, render_report,
};
use std::path::Path;

fn invalid_service(service: &str) -> ConfigError {
    ConfigError::new(format!(
        "Invalid service name '{}': must not be empty, start with '.' or contain path separators",
        service
    ))
}

fn to_json(report: &UsageReport) -> PalisadeResult<String> {
    serde_json::to_string_pretty(report).map_err(|e| {
        StorageError::new(StorageErrorKind::Serialization(e.to_string())).into()
    })
}

/// Print usage statistics for one service or all of them.
pub async fn show_stats(
    governor: &UsageGovernor,
    service: Option<&str>,
    format: OutputFormat,
    output: Option<&Path>,
) -> PalisadeResult<()> {
    let report = governor.usage_stats(service).await;

    if let Some(name) = service
        && report.is_empty()
    {
        println!("No usage data for service '{}'.", name);
        return Ok(());
    }

    match format {
        OutputFormat::Human => print!("{}", render_report(&report)),
        OutputFormat::Json => println!("{}", to_json(&report)?),
    }

    if let Some(path) = output {
        std::fs::write(path, to_json(&report)?).map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "{}: {}",
                path.display(),
                e
            )))
        })?;
        println!("Report written to {}", path.display());
    }
    Ok(())
}

/// Set or remove a limit.
pub async fn set_limit(
    governor: &UsageGovernor,
    service: &str,
    kind: LimitKind,
    value: LimitValue,
) -> PalisadeResult<()> {
    if !governor.set_limit(service, kind, value.0).await {
        Err(invalid_service(service))?
    }
    governor.save().await?;
    match value.0 {
        Some(limit) => println!("Set {} limit for '{}' to {}.", kind, service, limit),
        None => println!("Removed {} limit for '{}'.", kind, service),
    }
    Ok(())
}

/// Update cost settings, or show them when nothing is given.
pub async fn set_cost(
    governor: &UsageGovernor,
    service: &str,
    per_call: Option<f64>,
    budget: Option<f64>,
) -> PalisadeResult<()> {
    if per_call.is_some() || budget.is_some() {
        if !governor.set_cost_info(service, per_call, budget).await? {
            Err(invalid_service(service))?
        }
        governor.save().await?;
    }

    match governor.record(service).await {
        Some(record) => {
            let costs = record.costs();
            println!("Cost settings for '{}':", service);
            println!("  per call:       {}", format_cost(*costs.cost_per_call()));
            match costs.monthly_budget() {
                Some(budget) => println!("  monthly budget: {}", format_cost(*budget)),
                None => println!("  monthly budget: unlimited"),
            }
            println!("  total cost:     {}", format_cost(*costs.total_cost()));
        }
        None => println!("No usage data for service '{}'.", service),
    }
    Ok(())
}

/// Zero counters for one service or all of them.
pub async fn clear(governor: &UsageGovernor, service: Option<&str>) -> PalisadeResult<()> {
    governor.clear_usage_data(service).await;
    governor.save().await?;
    match service {
        Some(name) => println!("Cleared usage data for '{}'.", name),
        None => println!("Cleared usage data for all services."),
    }
    Ok(())
}

/// Drop old hourly and daily buckets.
pub async fn prune(governor: &UsageGovernor, days: u32) -> PalisadeResult<()> {
    let removed = governor.prune_old_data(days).await;
    governor.save().await?;
    println!("Removed {} buckets older than {} days.", removed, days);
    Ok(())
}
