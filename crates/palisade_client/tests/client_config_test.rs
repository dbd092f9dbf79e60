//! Layered configuration and context construction.

use palisade_client::{ClientContext, PalisadeConfig};
use palisade_error::FailureKind;
use palisade_usage::LimitKind;
use tempfile::TempDir;

#[test]
fn test_bundled_defaults() {
    let config = PalisadeConfig::bundled().unwrap();

    assert_eq!(*config.cache().memory().max_size(), 100);
    assert_eq!(*config.cache().disk().max_size(), 1000);
    assert_eq!(*config.cache().memory().ttl_secs(), 86400.0);
    assert_eq!(*config.retry().retry_count(), 3);
    assert_eq!(*config.retry().max_delay(), 10.0);
    assert!(config.retry().retries(FailureKind::ServerError));
    assert!(!config.retry().retries(FailureKind::ClientError));
    assert!(*config.usage().auto_save());
    assert!(config.usage().services().is_empty());
}

#[test]
fn test_default_retry_matches_bundled() {
    let bundled = PalisadeConfig::bundled().unwrap();
    let default = PalisadeConfig::default();

    assert_eq!(bundled.retry(), default.retry());
    assert_eq!(bundled.cache().disk(), default.cache().disk());
    // Clients keep memory entries for a day; the bare tier default is an hour.
    assert_eq!(*default.cache().memory().ttl_secs(), 3600.0);
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let config = PalisadeConfig::from_toml(
        r#"
        [retry]
        retry_count = 5

        [cache.memory]
        max_size = 10
        ttl_secs = 30.0
        "#,
    )
    .unwrap();

    assert_eq!(*config.retry().retry_count(), 5);
    assert_eq!(*config.retry().base_delay(), 1.0);
    assert!(config.retry().retries(FailureKind::RateLimited));
    assert_eq!(*config.cache().memory().max_size(), 10);
    assert_eq!(*config.cache().disk().max_size(), 1000);
}

#[test]
fn test_partial_retry_table_keeps_transient_kinds() {
    let config = PalisadeConfig::from_toml("[retry]\nmax_delay = 30.0\n").unwrap();

    assert_eq!(*config.retry().max_delay(), 30.0);
    for kind in FailureKind::transient() {
        assert!(config.retry().retries(kind), "{kind} should be retried");
    }
    assert!(!config.retry().retries(FailureKind::ClientError));
}

#[test]
fn test_invalid_values_rejected() {
    assert!(PalisadeConfig::from_toml("[cache.memory]\nmax_size = 0\nttl_secs = 1.0").is_err());
    assert!(PalisadeConfig::from_toml("[retry]\nbase_delay = -1.0").is_err());
    assert!(
        PalisadeConfig::from_toml("[usage.services.openai]\nmonthly_budget = -5.0").is_err()
    );
    assert!(PalisadeConfig::from_toml("[retry]\nretry_on = [\"bogus\"]").is_err());
}

#[test]
fn test_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("palisade.toml");
    std::fs::write(&path, "[usage]\nauto_save = false\n").unwrap();

    let config = PalisadeConfig::from_file(&path).unwrap();
    assert!(!*config.usage().auto_save());
    assert_eq!(config.retry(), PalisadeConfig::bundled().unwrap().retry());
    assert!(PalisadeConfig::from_file(dir.path().join("missing.toml")).is_err());
}

#[tokio::test]
async fn test_context_from_config_applies_quotas() {
    let dir = TempDir::new().unwrap();
    let text = format!(
        r#"
        [cache]
        cache_dir = '{}'
        memory_enabled = true
        disk_enabled = true

        [usage]
        data_dir = '{}'
        auto_save = false

        [usage.services.openai]
        hourly = 500
        cost_per_call = 0.002
        "#,
        dir.path().join("cache").display(),
        dir.path().join("usage").display(),
    );
    let config = PalisadeConfig::from_toml(&text).unwrap();
    let context = ClientContext::from_config(&config).await.unwrap();

    assert!(context.cache().is_some());
    assert!(dir.path().join("cache").is_dir());

    let governor = context.governor().unwrap();
    let record = governor.record("openai").await.unwrap();
    assert_eq!(record.limits().get(LimitKind::Hourly), Some(500));
    assert_eq!(*record.costs().cost_per_call(), 0.002);
}

#[tokio::test]
async fn test_context_without_cache_tiers() {
    let dir = TempDir::new().unwrap();
    let text = format!(
        "[cache]\nmemory_enabled = false\ndisk_enabled = false\n\n[usage]\ndata_dir = '{}'\n",
        dir.path().display(),
    );
    let config = PalisadeConfig::from_toml(&text).unwrap();
    let context = ClientContext::from_config(&config).await.unwrap();

    assert!(context.cache().is_none());
    assert!(context.governor().is_some());
}
