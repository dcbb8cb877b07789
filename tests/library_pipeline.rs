//! 编排流水线集成测试
//!
//! 覆盖旁路缓存的完整路径：未命中取数、命中复用、缓存故障分级、
//! 响应归一化和结构不变量。

use std::sync::Arc;

use bookshelf::cancel::CancelToken;
use bookshelf::config::constants;
use bookshelf::error::LibraryError;
use bookshelf::models::{DataSource, LibraryPageData, QueryParams};
use bookshelf::orchestrator::{LibraryOrchestrator, OrchestratorConfig};
use bookshelf::organizer::LibraryOrganizer;
use bookshelf::storage::{CacheStore, MemoryCacheStore};
use bookshelf::validation::{QueryValidationRules, StructuralValidator};

mod common;

use common::{CountingProvider, FailingCacheStore, TestDataGenerator};

fn library_params() -> QueryParams {
    let mut params = QueryParams::new();
    params.insert("domain".to_string(), "library".to_string());
    params
}

/// 场景：缓存未命中 → 恰好一次取数、恰好一次缓存写入、来源为数据库
#[tokio::test]
async fn test_cache_miss_fetches_once_and_writes_once() {
    let cache = Arc::new(MemoryCacheStore::with_defaults());
    let provider = CountingProvider::new(TestDataGenerator::valid_books(3));
    let orchestrator = LibraryOrchestrator::new(cache.clone(), provider.clone());
    let cancel = CancelToken::new();

    let response = orchestrator
        .get_library_data(7, &library_params(), &cancel)
        .await
        .unwrap();

    assert_eq!(response.source, DataSource::Database);
    assert_eq!(response.data.books.len(), 3);
    assert!(!response.request_id.is_empty());
    assert_eq!(provider.call_count(), 1);
    assert_eq!(cache.stats().writes, 1);

    println!("✅ Cache-miss orchestration scenario passed");
}

/// 场景：第二次调用命中缓存，数据源不再被访问
#[tokio::test]
async fn test_second_call_is_served_from_cache() {
    let cache = Arc::new(MemoryCacheStore::with_defaults());
    let provider = CountingProvider::new(TestDataGenerator::valid_books(2));
    let orchestrator = LibraryOrchestrator::new(cache.clone(), provider.clone());
    let cancel = CancelToken::new();

    let first = orchestrator
        .get_library_data(7, &library_params(), &cancel)
        .await
        .unwrap();
    let second = orchestrator
        .get_library_data(7, &library_params(), &cancel)
        .await
        .unwrap();

    assert_eq!(first.source, DataSource::Database);
    assert_eq!(second.source, DataSource::Cache);
    assert_eq!(provider.call_count(), 1);
    // 命中路径同样归一化，两次响应的数据一致
    assert_eq!(first.data, second.data);

    let stats = orchestrator.stats();
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.cache_misses, 1);

    println!("✅ Cache-hit reuse scenario passed");
}

/// 场景：单作者、无封面、无形态的行归一化后满足前端契约
#[tokio::test]
async fn test_sparse_row_is_normalized() {
    let cache = Arc::new(MemoryCacheStore::with_defaults());
    let provider = CountingProvider::new(vec![TestDataGenerator::sparse_book(1, "Jane Doe")]);
    let orchestrator = LibraryOrchestrator::new(cache, provider);
    let cancel = CancelToken::new();

    let response = orchestrator
        .get_library_data(1, &library_params(), &cancel)
        .await
        .unwrap();

    let book = &response.data.books[0];
    assert_eq!(book.image_link, constants::DEFAULT_COVER_IMAGE);
    assert_eq!(book.formats, vec!["physical".to_string()]);
    assert_eq!(book.publish_date, constants::DEFAULT_PUBLISH_DATE);
    assert!(!book.description.is_empty());

    // 分类视图内的副本同样被归一化
    let indexed = &response.data.books_by_authors.by_author["Jane Doe"][0];
    assert_eq!(indexed.image_link, constants::DEFAULT_COVER_IMAGE);
    assert_eq!(indexed.formats, vec!["physical".to_string()]);

    println!("✅ Normalization scenario passed");
}

/// 缓存读取故障中止请求（区别于未命中）
#[tokio::test]
async fn test_cache_read_failure_aborts_request() {
    let cache = FailingCacheStore::new(true, false);
    let provider = CountingProvider::new(TestDataGenerator::valid_books(1));
    let orchestrator = LibraryOrchestrator::new(cache, provider.clone());
    let cancel = CancelToken::new();

    let error = orchestrator
        .get_library_data(1, &library_params(), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(error, LibraryError::Cache(_)));
    assert_eq!(provider.call_count(), 0);
}

/// 缓存写入故障被吞掉，请求照常成功
#[tokio::test]
async fn test_cache_write_failure_does_not_fail_request() {
    let cache = FailingCacheStore::new(false, true);
    let provider = CountingProvider::new(TestDataGenerator::valid_books(2));
    let orchestrator = LibraryOrchestrator::new(cache.clone(), provider);
    let cancel = CancelToken::new();

    let response = orchestrator
        .get_library_data(1, &library_params(), &cancel)
        .await
        .unwrap();

    assert_eq!(response.source, DataSource::Database);
    assert_eq!(cache.set_calls(), 1);
    assert_eq!(orchestrator.stats().cache_write_failures, 1);
}

/// 结构损坏的缓存载荷按未命中处理，回退数据库路径
#[tokio::test]
async fn test_structurally_corrupt_cache_payload_falls_back() {
    let cache = Arc::new(MemoryCacheStore::with_defaults());
    let params = library_params();

    // 预置一份违反不变量的载荷：名称列表里的作者没有对应分组
    let mut corrupt = LibraryPageData::new();
    corrupt
        .books_by_authors
        .all_authors
        .push("幽灵作者".to_string());
    cache.set(3, &params, &corrupt).await.unwrap();

    let provider = CountingProvider::new(TestDataGenerator::valid_books(1));
    let orchestrator = LibraryOrchestrator::new(cache, provider.clone());
    let cancel = CancelToken::new();

    let response = orchestrator
        .get_library_data(3, &params, &cancel)
        .await
        .unwrap();

    assert_eq!(response.source, DataSource::Database);
    assert_eq!(provider.call_count(), 1);
    assert_eq!(orchestrator.stats().corrupt_cache_payloads, 1);
}

/// 空的数据源结果产生结构完整的空响应
#[tokio::test]
async fn test_empty_library_produces_valid_empty_response() {
    let cache = Arc::new(MemoryCacheStore::with_defaults());
    let provider = CountingProvider::new(Vec::new());
    let orchestrator = LibraryOrchestrator::new(cache, provider);
    let cancel = CancelToken::new();

    let mut response = orchestrator
        .get_library_data(5, &library_params(), &cancel)
        .await
        .unwrap();

    assert!(response.data.books.is_empty());
    assert!(StructuralValidator::new()
        .validate(&mut response.data)
        .is_ok());
}

/// 已取消的令牌使编排立即返回，且不会写缓存
#[tokio::test]
async fn test_cancelled_token_short_circuits() {
    let cache = FailingCacheStore::new(false, false);
    let provider = CountingProvider::new(TestDataGenerator::valid_books(1));
    let orchestrator = LibraryOrchestrator::new(cache.clone(), provider.clone());

    let cancel = CancelToken::new();
    cancel.cancel();

    let error = orchestrator
        .get_library_data(1, &library_params(), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(error, LibraryError::Cancelled));
    assert_eq!(provider.call_count(), 0);
    assert_eq!(cache.set_calls(), 0);
}

/// 序列化往返后的页面数据结构仍然有效且内容一致
#[tokio::test]
async fn test_page_data_roundtrip_preserves_structure() {
    let organizer = LibraryOrganizer::new();
    let raw = bookshelf::models::RawLibraryData {
        user_id: 1,
        books: TestDataGenerator::valid_books(5),
    };
    let data = organizer.process(raw).unwrap();

    let serialized = serde_json::to_string(&data).unwrap();
    let mut deserialized: LibraryPageData = serde_json::from_str(&serialized).unwrap();

    assert!(StructuralValidator::new()
        .validate(&mut deserialized)
        .is_ok());
    assert_eq!(deserialized.books, data.books);
    assert_eq!(
        deserialized.books_by_authors.all_authors,
        data.books_by_authors.all_authors
    );
    assert_eq!(
        deserialized.books_by_genres.by_genre,
        data.books_by_genres.by_genre
    );

    println!("✅ Round-trip property passed");
}

/// 查询参数在进入编排器之前由规则表校验
#[tokio::test]
async fn test_query_params_validated_before_orchestration() {
    let rules = QueryValidationRules::default_rules();

    let mut bad_params = QueryParams::new();
    bad_params.insert("domain".to_string(), "everything".to_string());
    let errors = rules.validate(&bad_params).await;
    assert!(!errors.is_empty());

    let good_params = library_params();
    assert!(rules.validate(&good_params).await.is_empty());

    // 只有通过校验的参数才交给编排器
    let cache = Arc::new(MemoryCacheStore::with_defaults());
    let provider = CountingProvider::new(TestDataGenerator::valid_books(1));
    let orchestrator = LibraryOrchestrator::new(cache, provider);
    let response = orchestrator
        .get_library_data(2, &good_params, &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(response.data.books.len(), 1);
}

/// 后台缓存写入模式：响应不等待写入完成，但写入最终发生
#[tokio::test]
async fn test_background_cache_write_completes_eventually() {
    let cache = Arc::new(MemoryCacheStore::with_defaults());
    let provider = CountingProvider::new(TestDataGenerator::valid_books(2));
    let config = OrchestratorConfig {
        background_cache_write: true,
        ..Default::default()
    };
    let orchestrator = LibraryOrchestrator::with_config(cache.clone(), provider, config);

    let response = orchestrator
        .get_library_data(9, &library_params(), &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(response.source, DataSource::Database);

    // 分离任务完成写入
    let mut written = false;
    for _ in 0..50 {
        if cache.stats().writes == 1 {
            written = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(written, "后台缓存写入未在限期内完成");
}
