// 集成测试公共模块
//
// 提供测试数据生成器和可计数的外部接口替身

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use bookshelf::error::{LibraryError, LibraryResult};
use bookshelf::models::{Book, LibraryPageData, QueryParams, RawLibraryData};
use bookshelf::storage::{CacheStore, DomainDataProvider};

/// 测试数据生成器
pub struct TestDataGenerator;

impl TestDataGenerator {
    /// 一本字段齐全、可通过内容校验的图书
    pub fn valid_book(id: i64) -> Book {
        Book {
            id,
            title: format!("示例图书 {}", id),
            description: "<p>集成测试用样书。</p>".to_string(),
            language: "zh".to_string(),
            page_count: 256,
            publish_date: "2022-03-15".to_string(),
            isbn10: "123456789X".to_string(),
            isbn13: "9781234567897".to_string(),
            image_link: format!("/covers/{}.jpg", id),
            authors: vec![format!("作者{}", id % 7)],
            genres: vec!["科幻".to_string()],
            tags: vec!["收藏".to_string()],
            formats: vec!["physical".to_string()],
            is_in_library: true,
            ..Default::default()
        }
    }

    /// 生成 n 本有效图书
    pub fn valid_books(count: i64) -> Vec<Book> {
        (0..count).map(Self::valid_book).collect()
    }

    /// 只有最少字段的稀疏行，用于归一化场景
    pub fn sparse_book(id: i64, author: &str) -> Book {
        Book {
            id,
            title: format!("稀疏行 {}", id),
            authors: vec![author.to_string()],
            ..Default::default()
        }
    }
}

/// 记录调用次数的领域数据源
pub struct CountingProvider {
    books: Vec<Book>,
    calls: AtomicUsize,
}

impl CountingProvider {
    pub fn new(books: Vec<Book>) -> Arc<Self> {
        Arc::new(Self {
            books,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DomainDataProvider for CountingProvider {
    async fn get_data(&self, user_id: i64, _params: &QueryParams) -> LibraryResult<RawLibraryData> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(RawLibraryData {
            user_id,
            books: self.books.clone(),
        })
    }
}

/// 可配置故障的缓存替身
pub struct FailingCacheStore {
    pub fail_get: bool,
    pub fail_set: bool,
    set_calls: AtomicUsize,
}

impl FailingCacheStore {
    pub fn new(fail_get: bool, fail_set: bool) -> Arc<Self> {
        Arc::new(Self {
            fail_get,
            fail_set,
            set_calls: AtomicUsize::new(0),
        })
    }

    pub fn set_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheStore for FailingCacheStore {
    async fn get(
        &self,
        _user_id: i64,
        _params: &QueryParams,
    ) -> LibraryResult<Option<LibraryPageData>> {
        if self.fail_get {
            Err(LibraryError::Cache("注入的读取故障".to_string()))
        } else {
            Ok(None)
        }
    }

    async fn set(
        &self,
        _user_id: i64,
        _params: &QueryParams,
        _data: &LibraryPageData,
    ) -> LibraryResult<()> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_set {
            Err(LibraryError::Cache("注入的写入故障".to_string()))
        } else {
            Ok(())
        }
    }
}
