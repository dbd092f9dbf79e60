//! Human-readable rendering of usage reports and cache statistics.

use palisade_cache::CacheStats;
use palisade_usage::{LimitKind, ServiceStats, UsageReport, UsageSummary};
use std::fmt::Write;
use strum::IntoEnumIterator;

/// Format a cost in dollars, with more decimals for small amounts.
///
/// # Examples
///
/// ```
/// use palisade::format_cost;
///
/// assert_eq!(format_cost(0.0025), "$0.002500");
/// assert_eq!(format_cost(0.25), "$0.2500");
/// assert_eq!(format_cost(12.5), "$12.50");
/// ```
pub fn format_cost(cost: f64) -> String {
    if cost < 0.01 {
        format!("${:.6}", cost)
    } else if cost < 1.0 {
        format!("${:.4}", cost)
    } else {
        format!("${:.2}", cost)
    }
}

/// Format a count with thousands separators.
///
/// # Examples
///
/// ```
/// use palisade::format_count;
///
/// assert_eq!(format_count(999), "999");
/// assert_eq!(format_count(1_234_567), "1,234,567");
/// ```
pub fn format_count(count: u64) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    out
}

/// Render a usage report: the summary (if any), then one section per service.
pub fn render_report(report: &UsageReport) -> String {
    if report.is_empty() {
        return "No usage data recorded.\n".to_string();
    }

    let mut out = String::new();
    if let Some(summary) = report.summary() {
        render_summary(&mut out, summary);
    }
    for (name, stats) in report.services() {
        render_service(&mut out, name, stats);
    }
    out
}

fn render_summary(out: &mut String, summary: &UsageSummary) {
    let _ = writeln!(out, "=== Usage summary ===");
    let _ = writeln!(out, "Total calls:    {}", format_count(*summary.total_calls()));
    let _ = writeln!(
        out,
        "Succeeded:      {} ({:.1}%)",
        format_count(*summary.success_count()),
        summary.success_rate()
    );
    let _ = writeln!(out, "Failed:         {}", format_count(*summary.error_count()));
    let _ = writeln!(out, "Total cost:     {}", format_cost(*summary.total_cost()));
}

fn render_service(out: &mut String, name: &str, stats: &ServiceStats) {
    let _ = writeln!(out, "\n=== {} ===", name.to_uppercase());
    let _ = writeln!(out, "Total calls:    {}", format_count(*stats.total_calls()));
    let _ = writeln!(out, "Success rate:   {:.1}%", stats.success_rate());
    let _ = writeln!(out, "Total cost:     {}", format_cost(*stats.total_cost()));

    let today = stats.today();
    let _ = writeln!(
        out,
        "Today:          {} calls, {}",
        format_count(*today.calls()),
        format_cost(*today.cost())
    );

    let month = stats.this_month();
    let _ = writeln!(
        out,
        "This month:     {} calls, {}",
        format_count(*month.calls()),
        format_cost(*month.cost())
    );
    if let Some(budget) = month.budget() {
        let _ = writeln!(
            out,
            "Monthly budget: {} ({:.1}% used)",
            format_cost(*budget),
            month.budget_used_percent()
        );
    }

    let limits: Vec<String> = LimitKind::iter()
        .filter_map(|kind| {
            stats
                .limits()
                .get(kind)
                .map(|limit| format!("{} {}", kind, format_count(limit)))
        })
        .collect();
    let limits = if limits.is_empty() {
        "unlimited".to_string()
    } else {
        limits.join(", ")
    };
    let _ = writeln!(out, "Limits:         {}", limits);

    let tokens = stats.tokens();
    if *tokens.total() > 0 {
        let _ = writeln!(
            out,
            "Tokens:         prompt {}, completion {}, total {}",
            format_count(*tokens.prompt()),
            format_count(*tokens.completion()),
            format_count(*tokens.total())
        );
    }

    let _ = writeln!(
        out,
        "Last updated:   {}",
        stats.last_updated().format("%Y-%m-%d %H:%M:%S UTC")
    );
}

/// Render per-tier cache statistics.
pub fn render_cache_stats(stats: &CacheStats) -> String {
    let mut out = String::new();
    match stats.memory() {
        Some(memory) => {
            let _ = writeln!(out, "=== Memory tier ===");
            let _ = writeln!(
                out,
                "Items:          {} / {} ({:.1}%)",
                format_count(*memory.total_items() as u64),
                format_count(*memory.max_size() as u64),
                memory.usage_percent()
            );
            let _ = writeln!(out, "Expired:        {}", format_count(*memory.expired_items() as u64));
            let _ = writeln!(out, "TTL:            {}s", memory.ttl_secs());
        }
        None => {
            let _ = writeln!(out, "Memory tier disabled.");
        }
    }
    match stats.disk() {
        Some(disk) => {
            let _ = writeln!(out, "=== Disk tier ===");
            let _ = writeln!(
                out,
                "Items:          {} / {} ({:.1}%)",
                format_count(*disk.total_items() as u64),
                format_count(*disk.max_size() as u64),
                disk.usage_percent()
            );
            let _ = writeln!(out, "Expired:        {}", format_count(*disk.expired_items() as u64));
            let _ = writeln!(out, "TTL:            {}s", disk.ttl_secs());
            let _ = writeln!(
                out,
                "On disk:        {} files, {:.2} MB",
                format_count(*disk.file_count() as u64),
                disk.total_size_mb()
            );
        }
        None => {
            let _ = writeln!(out, "Disk tier disabled.");
        }
    }
    out
}
