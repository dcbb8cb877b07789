//! 缓存系统集成测试
//!
//! 测试键派生的确定性、TTL 与容量淘汰，以及统计监控。

use std::time::Duration;

use bookshelf::models::QueryParams;
use bookshelf::storage::{cache_key, CacheStore, MemoryCacheStore};

mod common;

use common::TestDataGenerator;

fn params(pairs: &[(&str, &str)]) -> QueryParams {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

fn page_with_books(count: i64) -> bookshelf::models::LibraryPageData {
    let mut data = bookshelf::models::LibraryPageData::new();
    data.books = TestDataGenerator::valid_books(count);
    data
}

/// 键是 (用户, 参数) 的确定性函数
#[test]
fn test_cache_key_determinism() {
    let a = params(&[("domain", "library"), ("sort", "title")]);
    let b = params(&[("sort", "title"), ("domain", "library")]);

    assert_eq!(cache_key(1, &a), cache_key(1, &b));
    assert_ne!(cache_key(1, &a), cache_key(2, &a));
    assert_ne!(
        cache_key(1, &a),
        cache_key(1, &params(&[("domain", "wishlist")]))
    );
    assert!(cache_key(1, &a).starts_with("bookshelf:library:1:"));
}

/// 存取往返保持页面数据内容不变
#[tokio::test]
async fn test_store_roundtrip_preserves_data() {
    let store = MemoryCacheStore::with_defaults();
    let query = params(&[("domain", "library")]);
    let data = page_with_books(4);

    store.set(11, &query, &data).await.unwrap();
    let loaded = store.get(11, &query).await.unwrap().unwrap();

    assert_eq!(loaded, data);
    assert_eq!(loaded.books.len(), 4);
}

/// 不同参数集互不可见
#[tokio::test]
async fn test_params_partition_the_cache() {
    let store = MemoryCacheStore::with_defaults();
    let data = page_with_books(1);

    store
        .set(1, &params(&[("domain", "library")]), &data)
        .await
        .unwrap();

    assert!(store
        .get(1, &params(&[("domain", "wishlist")]))
        .await
        .unwrap()
        .is_none());
    assert!(store
        .get(1, &params(&[("domain", "library")]))
        .await
        .unwrap()
        .is_some());
}

/// 统计监控：命中率随访问模式变化，重置后归零
#[tokio::test]
async fn test_cache_statistics_monitoring() {
    let store = MemoryCacheStore::new(32, Duration::from_secs(300));
    let data = page_with_books(2);

    for user_id in 0..10 {
        let query = params(&[("domain", "library")]);
        assert!(store.get(user_id, &query).await.unwrap().is_none());
        store.set(user_id, &query, &data).await.unwrap();
        assert!(store.get(user_id, &query).await.unwrap().is_some());
    }

    let stats = store.stats();
    assert_eq!(stats.misses, 10);
    assert_eq!(stats.hits, 10);
    assert_eq!(stats.writes, 10);
    assert_eq!(stats.hit_rate(), 0.5);

    store.reset_stats();
    let reset = store.stats();
    assert_eq!(reset.hits, 0);
    assert_eq!(reset.misses, 0);

    println!("✅ Cache statistics monitoring test passed");
}

/// 容量上限触发 LRU 淘汰
#[tokio::test]
async fn test_capacity_triggers_lru_eviction() {
    let store = MemoryCacheStore::new(3, Duration::from_secs(300));
    let data = page_with_books(1);
    let query = QueryParams::new();

    for user_id in 1..=3 {
        store.set(user_id, &query, &data).await.unwrap();
    }
    // 访问 1 号使其变为最近使用
    assert!(store.get(1, &query).await.unwrap().is_some());

    store.set(4, &query, &data).await.unwrap();

    assert_eq!(store.len(), 3);
    // 最久未使用的 2 号被淘汰
    assert!(store.get(2, &query).await.unwrap().is_none());
    assert!(store.get(1, &query).await.unwrap().is_some());
    assert!(store.get(4, &query).await.unwrap().is_some());
}

/// TTL 过期条目按未命中处理并被清除
#[tokio::test]
async fn test_ttl_expiry_counts_as_miss() {
    let store = MemoryCacheStore::new(8, Duration::from_millis(20));
    let query = QueryParams::new();
    store.set(1, &query, &page_with_books(1)).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(store.get(1, &query).await.unwrap().is_none());
    assert!(store.is_empty());

    let stats = store.stats();
    assert_eq!(stats.evictions, 1);
    assert_eq!(stats.hits, 0);
}

/// 定期清理把过期条目一次性移除
#[tokio::test]
async fn test_cleanup_expired_sweeps_all() {
    let store = MemoryCacheStore::new(8, Duration::from_millis(10));
    let data = page_with_books(1);

    for user_id in 0..5 {
        store.set(user_id, &QueryParams::new(), &data).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(40)).await;

    assert_eq!(store.cleanup_expired(), 5);
    assert!(store.is_empty());
}
