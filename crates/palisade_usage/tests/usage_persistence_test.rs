//! Usage governor persistence across instances.

use palisade_error::ExceededLimit;
use palisade_usage::{CallRecord, LimitKind, ServiceQuota, UsageConfig, UsageGovernor};
use std::collections::BTreeMap;
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test]
async fn test_save_and_reopen_round_trip() {
    let dir = TempDir::new().unwrap();

    {
        let governor = UsageGovernor::open(dir.path()).await.unwrap();
        governor.set_limit("search", LimitKind::Hourly, Some(5)).await;
        governor
            .set_cost_info("search", Some(0.01), Some(3.0))
            .await
            .unwrap();
        for _ in 0..3 {
            governor
                .record_call("search", CallRecord::new("/q", true))
                .await;
        }
        governor
            .record_call("search", CallRecord::new("/q", false).with_metadata_entry("status", 503))
            .await;
        governor.save().await.unwrap();
    }

    assert!(dir.path().join("search.json").exists());

    let reopened = UsageGovernor::open(dir.path()).await.unwrap();
    let record = reopened.record("search").await.unwrap();
    assert_eq!(*record.total_calls(), 4);
    assert_eq!(*record.success_count(), 3);
    assert_eq!(*record.error_count(), 1);
    assert_eq!(*record.limits().hourly(), Some(5));
    assert_eq!(*record.costs().monthly_budget(), Some(3.0));
    assert!((record.costs().total_cost() - 0.04).abs() < 1e-9);
    assert_eq!(record.last_call().as_ref().unwrap().metadata()["status"], 503);
    assert_eq!(record.hourly_usage().len(), 1);
}

#[tokio::test]
async fn test_saved_file_schema() {
    let dir = TempDir::new().unwrap();
    let governor = UsageGovernor::open(dir.path()).await.unwrap();
    governor
        .record_call("search", CallRecord::new("/q", true))
        .await;
    governor.save().await.unwrap();

    let text = std::fs::read_to_string(dir.path().join("search.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    for field in [
        "hourly_usage",
        "daily_usage",
        "monthly_usage",
        "limits",
        "costs",
        "total_calls",
        "success_count",
        "error_count",
        "total_tokens",
        "last_updated",
        "api_type",
    ] {
        assert!(json.get(field).is_some(), "missing {field}");
    }
    assert_eq!(json["limits"]["hourly"], serde_json::Value::Null);
    assert_eq!(json["api_type"], "search");

    let (hour_key, hour) = json["hourly_usage"].as_object().unwrap().iter().next().unwrap();
    assert_eq!(hour_key.len(), "2024-05-14-10".len());
    assert_eq!(hour["calls"], 1);
    assert_eq!(hour["endpoints"]["/q"]["success"], 1);
}

#[tokio::test]
async fn test_corrupt_file_skipped() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("broken.json"), b"{ not json").unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

    let governor = UsageGovernor::open(dir.path()).await.unwrap();
    assert!(governor.services().await.is_empty());
}

#[tokio::test]
async fn test_malformed_bucket_keys_skipped_on_load() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("legacy.json"),
        br#"{
            "hourly_usage": {"garbage": {"calls": 1}, "2024-05-14-10": {"calls": 2, "success": 2}},
            "daily_usage": {"2024-05-14": {"calls": 2, "success": 2, "cost": 0.5}},
            "total_calls": 2,
            "success_count": 2,
            "api_type": "legacy"
        }"#,
    )
    .unwrap();

    let governor = UsageGovernor::open(dir.path()).await.unwrap();
    let record = governor.record("legacy").await.unwrap();
    assert_eq!(*record.total_calls(), 2);
    assert_eq!(record.hourly_usage().len(), 1);
    assert_eq!(record.daily_usage().len(), 1);
    assert_eq!(*record.limits().hourly(), None);
}

#[tokio::test]
async fn test_load_discards_unsaved_changes() {
    let dir = TempDir::new().unwrap();
    let governor = UsageGovernor::open(dir.path())
        .await
        .unwrap()
        .with_auto_save(false, Duration::from_secs(60));
    governor
        .record_call("search", CallRecord::new("/q", true))
        .await;
    assert!(!dir.path().join("search.json").exists());

    governor.load().await;
    assert!(governor.record("search").await.is_none());
}

#[tokio::test]
async fn test_auto_save_after_interval() {
    let dir = TempDir::new().unwrap();
    let governor = UsageGovernor::open(dir.path())
        .await
        .unwrap()
        .with_auto_save(true, Duration::ZERO);

    tokio::time::sleep(Duration::from_millis(5)).await;
    governor
        .record_call("search", CallRecord::new("/q", true))
        .await;

    assert!(dir.path().join("search.json").exists());
}

#[tokio::test]
async fn test_from_config_applies_quotas() {
    let dir = TempDir::new().unwrap();
    let mut services = BTreeMap::new();
    services.insert(
        "search".to_string(),
        ServiceQuota::default().with_total(1).with_cost_per_call(0.5),
    );
    let config = UsageConfig::default()
        .with_data_dir(Some(dir.path().to_path_buf()))
        .with_services(services);

    let governor = UsageGovernor::from_config(&config).await.unwrap();
    governor
        .record_call("search", CallRecord::new("/q", true))
        .await;

    assert_eq!(
        governor.check_limits("search").await,
        Some(ExceededLimit::Total)
    );
    let record = governor.record("search").await.unwrap();
    assert_eq!(*record.costs().total_cost(), 0.5);
    assert!(dir.path().join("search.json").exists());
}

#[tokio::test]
async fn test_from_config_rejects_negative_budget() {
    let dir = TempDir::new().unwrap();
    let mut services = BTreeMap::new();
    services.insert(
        "search".to_string(),
        ServiceQuota::default().with_monthly_budget(-5.0),
    );
    let config = UsageConfig::default()
        .with_data_dir(Some(dir.path().to_path_buf()))
        .with_services(services);

    assert!(UsageGovernor::from_config(&config).await.is_err());
}
