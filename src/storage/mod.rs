//! 存储接口层
//!
//! 缓存与领域数据源对核心而言都是外部协作方，这里只定义接口和
//! 进程内实现：
//! - **cache**: 页面数据缓存接口与进程内 LRU 实现
//! - **provider**: 领域数据源接口与固定数据实现

/// 页面数据缓存
pub mod cache;

/// 领域数据源
pub mod provider;

pub use cache::{cache_key, CacheStore, CacheStoreStats, MemoryCacheStore};
pub use provider::{DomainDataProvider, StaticDataProvider};
