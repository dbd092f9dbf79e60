//! Rendering of usage reports and cache statistics.

use chrono::{TimeZone, Utc};
use palisade::{
    BoundedCache, CallRecord, FixedClock, LimitKind, TierConfig, TieredCacheManager, Tokens,
    UsageGovernor, format_cost, format_count, render_cache_stats, render_report,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_cost_precision_bands() {
    assert_eq!(format_cost(0.0), "$0.000000");
    assert_eq!(format_cost(0.009999), "$0.009999");
    assert_eq!(format_cost(0.01), "$0.0100");
    assert_eq!(format_cost(0.9999), "$0.9999");
    assert_eq!(format_cost(1.0), "$1.00");
    assert_eq!(format_cost(1234.5), "$1234.50");
}

#[test]
fn test_thousands_separators() {
    assert_eq!(format_count(0), "0");
    assert_eq!(format_count(100), "100");
    assert_eq!(format_count(1000), "1,000");
    assert_eq!(format_count(123_456), "123,456");
    assert_eq!(format_count(1_000_000), "1,000,000");
}

async fn governor(dir: &TempDir) -> UsageGovernor {
    let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 5, 14, 10, 15, 0).unwrap());
    UsageGovernor::open(dir.path())
        .await
        .unwrap()
        .with_clock(Arc::new(clock))
        .with_auto_save(false, Duration::from_secs(60))
}

#[tokio::test]
async fn test_render_empty_report() {
    let dir = TempDir::new().unwrap();
    let governor = governor(&dir).await;

    let text = render_report(&governor.usage_stats(None).await);
    assert_eq!(text, "No usage data recorded.\n");
}

#[tokio::test]
async fn test_render_report_sections() {
    let dir = TempDir::new().unwrap();
    let governor = governor(&dir).await;

    governor
        .set_cost_info("openai", None, Some(50.0))
        .await
        .unwrap();
    governor.set_limit("openai", LimitKind::Daily, Some(5000)).await;
    for _ in 0..3 {
        governor
            .record_call(
                "openai",
                CallRecord::new("/v1/chat", true)
                    .with_cost(0.5)
                    .with_tokens(Tokens::new(1000, 200)),
            )
            .await;
    }
    governor
        .record_call("search", CallRecord::new("/q", false))
        .await;

    let text = render_report(&governor.usage_stats(None).await);

    assert!(text.contains("=== Usage summary ==="));
    assert!(text.contains("Total calls:    4"));
    assert!(text.contains("Succeeded:      3 (75.0%)"));
    assert!(text.contains("=== OPENAI ==="));
    assert!(text.contains("=== SEARCH ==="));
    assert!(text.contains("Total cost:     $1.50"));
    assert!(text.contains("Monthly budget: $50.00 (3.0% used)"));
    assert!(text.contains("Limits:         daily 5,000"));
    assert!(text.contains("Tokens:         prompt 3,000, completion 600, total 3,600"));
    assert!(text.contains("Limits:         unlimited"));
    assert!(text.contains("Last updated:   2024-05-14 10:15:00 UTC"));
}

#[tokio::test]
async fn test_render_single_service_has_no_summary() {
    let dir = TempDir::new().unwrap();
    let governor = governor(&dir).await;
    governor
        .record_call("search", CallRecord::new("/q", true))
        .await;

    let text = render_report(&governor.usage_stats(Some("search")).await);

    assert!(!text.contains("Usage summary"));
    assert!(text.contains("=== SEARCH ==="));
    assert!(text.contains("Success rate:   100.0%"));
}

#[tokio::test]
async fn test_render_cache_stats() {
    let memory = BoundedCache::new(TierConfig::new(4, 60.0)).unwrap();
    let cache: TieredCacheManager<serde_json::Value> = TieredCacheManager::new(Some(memory), None);
    cache.set("a", serde_json::json!(1)).await;

    let text = render_cache_stats(&cache.stats().await);

    assert!(text.contains("=== Memory tier ==="));
    assert!(text.contains("Items:          1 / 4 (25.0%)"));
    assert!(text.contains("Disk tier disabled."));
}
