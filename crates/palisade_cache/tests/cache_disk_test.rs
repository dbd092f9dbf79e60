//! Tests for the disk cache tier.

use palisade_cache::{PersistentCache, TierConfig};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::time::Duration;
use tempfile::TempDir;

async fn open<V>(dir: &TempDir, max_size: usize, ttl_secs: f64) -> PersistentCache<V>
where
    V: Serialize + serde::de::DeserializeOwned,
{
    PersistentCache::open(dir.path(), TierConfig::new(max_size, ttl_secs))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_set_and_get() {
    let temp_dir = TempDir::new().unwrap();
    let cache = open(&temp_dir, 10, 60.0).await;

    let value = json!({"members": 100, "channels": [1, 2, 3]});
    cache.set("stats", &value).await;

    assert_eq!(cache.get("stats").await, Some(value));
    assert_eq!(cache.get("missing").await, None);
    assert!(temp_dir.path().join("metadata.json").exists());
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Nested {
    tags: HashSet<String>,
    pair: (u32, String),
    scores: BTreeMap<String, Vec<f64>>,
    lookup: HashMap<String, Option<bool>>,
}

#[tokio::test]
async fn test_nested_value_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let cache = open(&temp_dir, 10, 60.0).await;

    let value = Nested {
        tags: ["x", "y", "z"].iter().map(|s| s.to_string()).collect(),
        pair: (7, "seven".to_string()),
        scores: BTreeMap::from([("a".to_string(), vec![1.5, 2.5])]),
        lookup: HashMap::from([("yes".to_string(), Some(true)), ("none".to_string(), None)]),
    };

    cache.set("nested", &value).await;
    assert_eq!(cache.get("nested").await, Some(value));
}

#[tokio::test]
async fn test_tuple_keyed_map_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let cache = open(&temp_dir, 10, 60.0).await;

    let value: BTreeMap<(u32, u32), BTreeSet<(i8, String)>> = BTreeMap::from([
        ((0, 1), BTreeSet::from([(-1, "left".to_string()), (1, "right".to_string())])),
        ((2, 3), BTreeSet::new()),
    ]);

    cache.set("grid", &value).await;
    assert_eq!(cache.get("grid").await, Some(value.clone()));

    let reopened = open(&temp_dir, 10, 60.0).await;
    assert_eq!(reopened.get("grid").await, Some(value));
}

#[tokio::test]
async fn test_delete_removes_blob_and_index_entry() {
    let temp_dir = TempDir::new().unwrap();
    let cache = open(&temp_dir, 10, 60.0).await;

    cache.set("doomed", &json!("bye")).await;
    assert!(cache.contains_key("doomed").await);
    assert_eq!(*cache.stats().await.file_count(), 1);

    assert!(cache.delete("doomed").await);
    assert!(!cache.delete("doomed").await);
    assert!(!cache.contains_key("doomed").await);
    assert_eq!(*cache.stats().await.file_count(), 0);
}

#[tokio::test]
async fn test_clear() {
    let temp_dir = TempDir::new().unwrap();
    let cache = open(&temp_dir, 10, 60.0).await;

    for i in 0..5 {
        cache.set(&format!("k{}", i), &json!(i)).await;
    }
    cache.clear().await;

    assert!(cache.is_empty().await);
    let stats = cache.stats().await;
    assert_eq!(*stats.total_size_bytes(), 0);
}

#[tokio::test]
async fn test_size_limit_evicts_oldest() {
    let temp_dir = TempDir::new().unwrap();
    let cache = open(&temp_dir, 3, 60.0).await;

    for i in 0..5 {
        cache.set(&format!("k{}", i), &json!(i)).await;
        assert!(cache.len().await <= 3);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert_eq!(cache.get("k0").await, None);
    assert_eq!(cache.get("k1").await, None);
    assert_eq!(cache.get("k4").await, Some(json!(4)));
}

#[tokio::test]
async fn test_read_refreshes_timestamp() {
    let temp_dir = TempDir::new().unwrap();
    let cache = open(&temp_dir, 2, 60.0).await;

    cache.set("old", &json!(1)).await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    cache.set("newer", &json!(2)).await;
    tokio::time::sleep(Duration::from_millis(5)).await;

    // Reading "old" makes "newer" the oldest timestamp
    assert_eq!(cache.get("old").await, Some(json!(1)));
    tokio::time::sleep(Duration::from_millis(5)).await;
    cache.set("newest", &json!(3)).await;

    assert_eq!(cache.get("newer").await, None);
    assert_eq!(cache.get("old").await, Some(json!(1)));
}

#[tokio::test]
async fn test_ttl_expiry() {
    let temp_dir = TempDir::new().unwrap();
    let cache = open(&temp_dir, 10, 0.05).await;

    cache.set("short", &json!("lived")).await;
    assert!(cache.contains_key("short").await);

    tokio::time::sleep(Duration::from_millis(120)).await;

    assert_eq!(*cache.stats().await.expired_items(), 1);
    assert_eq!(cache.get("short").await, None);
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn test_persistence_across_instances() {
    let temp_dir = TempDir::new().unwrap();

    {
        let cache = open(&temp_dir, 10, 60.0).await;
        cache.set("survivor", &json!({"alive": true})).await;
    }

    let reopened: PersistentCache<serde_json::Value> = open(&temp_dir, 10, 60.0).await;
    assert_eq!(reopened.get("survivor").await, Some(json!({"alive": true})));
}

#[tokio::test]
async fn test_reopen_with_smaller_capacity_trims_index() {
    let temp_dir = TempDir::new().unwrap();

    {
        let cache = open(&temp_dir, 10, 60.0).await;
        for i in 0..6 {
            cache.set(&format!("k{}", i), &json!(i)).await;
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    let reopened: PersistentCache<serde_json::Value> = open(&temp_dir, 2, 60.0).await;
    assert_eq!(reopened.len().await, 2);
    assert_eq!(reopened.get("k5").await, Some(json!(5)));
}

#[tokio::test]
async fn test_corrupt_index_starts_empty() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("metadata.json"), b"{not json").unwrap();

    let cache: PersistentCache<serde_json::Value> = open(&temp_dir, 10, 60.0).await;
    assert!(cache.is_empty().await);

    cache.set("fresh", &json!(1)).await;
    assert_eq!(cache.get("fresh").await, Some(json!(1)));
}

#[tokio::test]
async fn test_missing_blob_is_a_miss() {
    let temp_dir = TempDir::new().unwrap();
    let cache = open(&temp_dir, 10, 60.0).await;

    cache.set("vanishing", &json!(1)).await;

    for entry in std::fs::read_dir(temp_dir.path()).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().is_some_and(|ext| ext == "cache") {
            std::fs::remove_file(path).unwrap();
        }
    }

    assert_eq!(cache.get("vanishing").await, None);
    assert!(!cache.contains_key("vanishing").await);
}

#[tokio::test]
async fn test_undecodable_blob_is_a_miss() {
    let temp_dir = TempDir::new().unwrap();

    {
        let cache = open(&temp_dir, 10, 60.0).await;
        cache.set("text", &json!("not a number")).await;
    }

    let typed: PersistentCache<u64> = open(&temp_dir, 10, 60.0).await;
    assert_eq!(typed.get("text").await, None);
}
