//! Tests for the tiered cache manager.

use palisade_cache::{
    BoundedCache, CacheConfig, PersistentCache, TierConfig, TieredCacheManager,
};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tempfile::TempDir;

async fn manager(dir: &TempDir) -> TieredCacheManager<Value> {
    let memory = BoundedCache::new(TierConfig::new(10, 60.0)).unwrap();
    let disk = PersistentCache::open(dir.path(), TierConfig::new(100, 600.0))
        .await
        .unwrap();
    TieredCacheManager::new(Some(memory), Some(disk))
}

#[tokio::test]
async fn test_set_writes_every_tier() {
    let temp_dir = TempDir::new().unwrap();
    let cache = manager(&temp_dir).await;

    cache.set("k", json!("v")).await;

    assert_eq!(cache.memory().unwrap().get("k").await, Some(json!("v")));
    assert_eq!(cache.disk().unwrap().get("k").await, Some(json!("v")));
}

#[tokio::test]
async fn test_memory_hit_comes_first() {
    let temp_dir = TempDir::new().unwrap();
    let cache = manager(&temp_dir).await;

    cache.disk().unwrap().set("k", &json!("disk")).await;
    cache.memory().unwrap().set("k", json!("memory")).await;

    assert_eq!(cache.get("k").await, Some(json!("memory")));
}

#[tokio::test]
async fn test_disk_hit_is_promoted() {
    let temp_dir = TempDir::new().unwrap();
    let cache = manager(&temp_dir).await;

    cache.disk().unwrap().set("k", &json!({"n": 1})).await;
    assert_eq!(cache.memory().unwrap().get("k").await, None);

    assert_eq!(cache.get("k").await, Some(json!({"n": 1})));
    assert_eq!(cache.memory().unwrap().get("k").await, Some(json!({"n": 1})));
}

#[tokio::test]
async fn test_miss_in_both_tiers() {
    let temp_dir = TempDir::new().unwrap();
    let cache = manager(&temp_dir).await;

    assert_eq!(cache.get("nowhere").await, None);
}

#[tokio::test]
async fn test_delete_reports_either_tier() {
    let temp_dir = TempDir::new().unwrap();
    let cache = manager(&temp_dir).await;

    cache.disk().unwrap().set("disk-only", &json!(1)).await;
    assert!(cache.delete("disk-only").await);
    assert!(!cache.delete("disk-only").await);

    cache.memory().unwrap().set("memory-only", json!(2)).await;
    assert!(cache.delete("memory-only").await);
}

#[tokio::test]
async fn test_clear_empties_both_tiers() {
    let temp_dir = TempDir::new().unwrap();
    let cache = manager(&temp_dir).await;

    cache.set("a", json!(1)).await;
    cache.set("b", json!(2)).await;
    cache.clear().await;

    assert!(cache.memory().unwrap().is_empty().await);
    assert!(cache.disk().unwrap().is_empty().await);

    let stats = cache.stats().await;
    assert_eq!(*stats.memory().as_ref().unwrap().total_items(), 0);
    assert_eq!(*stats.disk().as_ref().unwrap().total_items(), 0);
}

#[tokio::test]
async fn test_disabled_tiers_are_skipped() {
    let temp_dir = TempDir::new().unwrap();
    let cache = manager(&temp_dir).await;

    cache.set_disk_enabled(false);
    cache.set("memory-only", json!(1)).await;
    assert!(cache.disk().is_none());
    assert!(cache.stats().await.disk().is_none());

    cache.set_disk_enabled(true);
    assert_eq!(cache.disk().unwrap().get("memory-only").await, None);

    cache.set_memory_enabled(false);
    cache.set("disk-only", json!(2)).await;
    assert_eq!(cache.get("disk-only").await, Some(json!(2)));

    cache.set_memory_enabled(true);
    assert_eq!(cache.memory().unwrap().get("disk-only").await, None);
}

#[tokio::test]
async fn test_from_config_respects_disabled_disk() {
    let temp_dir = TempDir::new().unwrap();
    let cache_dir = temp_dir.path().join("never-created");
    let config = CacheConfig::default()
        .with_disk_enabled(false)
        .with_cache_dir(Some(cache_dir.clone()));

    let cache: TieredCacheManager<Value> = TieredCacheManager::from_config(&config).await.unwrap();

    assert!(cache.disk().is_none());
    assert!(cache.memory().is_some());
    assert!(!cache_dir.exists());
}

#[tokio::test]
async fn test_from_config_rejects_zero_capacity() {
    let config = CacheConfig::default().with_memory(TierConfig::new(0, 60.0));
    let result: Result<TieredCacheManager<Value>, _> = TieredCacheManager::from_config(&config).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_get_or_insert_with_caches_only_success() {
    let temp_dir = TempDir::new().unwrap();
    let cache = manager(&temp_dir).await;

    let failed: Result<Value, String> = cache
        .get_or_insert_with("k", || async { Err("boom".to_string()) })
        .await;
    assert!(failed.is_err());
    assert_eq!(cache.get("k").await, None);

    let computed: Result<Value, String> = cache
        .get_or_insert_with("k", || async { Ok(json!("fresh")) })
        .await;
    assert_eq!(computed.unwrap(), json!("fresh"));

    let cached: Result<Value, String> = cache
        .get_or_insert_with("k", || async { Ok(json!("recomputed")) })
        .await;
    assert_eq!(cached.unwrap(), json!("fresh"));
}

#[tokio::test]
async fn test_disk_only_tuple_keyed_values() {
    let temp_dir = TempDir::new().unwrap();
    let disk = PersistentCache::open(temp_dir.path(), TierConfig::new(10, 60.0))
        .await
        .unwrap();
    let cache: TieredCacheManager<BTreeMap<(u32, u32), String>> =
        TieredCacheManager::new(None, Some(disk));

    let value = BTreeMap::from([((1, 2), "a".to_string()), ((3, 4), "b".to_string())]);
    cache.set("pairs", value.clone()).await;

    assert_eq!(cache.get("pairs").await, Some(value));
}
