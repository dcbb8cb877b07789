//! 领域数据源接口
//!
//! 关系存储层对核心不透明：这里只定义取数契约。错误原样向上传播，
//! 重试（如果有）属于数据源实现自身的职责，编排器不做重试。

use async_trait::async_trait;

use crate::error::LibraryResult;
use crate::models::{Book, QueryParams, RawLibraryData};

/// 领域数据源
#[async_trait]
pub trait DomainDataProvider: Send + Sync {
    /// 拉取指定用户的原始图书馆数据
    async fn get_data(&self, user_id: i64, params: &QueryParams) -> LibraryResult<RawLibraryData>;
}

/// 固定数据源
///
/// 持有一组内存中的图书行，用于测试和演示。
#[derive(Debug, Clone, Default)]
pub struct StaticDataProvider {
    books: Vec<Book>,
}

impl StaticDataProvider {
    pub fn new(books: Vec<Book>) -> Self {
        Self { books }
    }
}

#[async_trait]
impl DomainDataProvider for StaticDataProvider {
    async fn get_data(&self, user_id: i64, _params: &QueryParams) -> LibraryResult<RawLibraryData> {
        tracing::debug!("从固定数据源取数: user_id={}", user_id);
        Ok(RawLibraryData {
            user_id,
            books: self.books.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_provider_returns_seeded_books() {
        let book = Book {
            id: 11,
            title: "种子数据".to_string(),
            ..Default::default()
        };
        let provider = StaticDataProvider::new(vec![book]);

        let raw = provider.get_data(5, &QueryParams::new()).await.unwrap();
        assert_eq!(raw.user_id, 5);
        assert_eq!(raw.books.len(), 1);
        assert_eq!(raw.books[0].id, 11);
    }
}
