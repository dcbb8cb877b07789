//! 图书馆页面数据缓存
//!
//! 以 (用户ID, 查询参数) 的确定性函数作为键的键值缓存。
//! 未命中返回 `Ok(None)`，这是控制流分支而不是错误；任何 `Err`
//! 都代表真实的缓存基础设施故障。

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;

use crate::config::constants;
use crate::error::{LibraryError, LibraryResult};
use crate::models::{LibraryPageData, QueryParams};

/// 派生确定性缓存键
///
/// 参数集合是有序映射，同样的 (用户, 参数) 永远得到同一个键。
pub fn cache_key(user_id: i64, params: &QueryParams) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&user_id.to_le_bytes());
    for (name, value) in params {
        hasher.update(name.as_bytes());
        hasher.update(&[0xfe]);
        hasher.update(value.as_bytes());
        hasher.update(&[0xff]);
    }
    format!(
        "{}{}:{}",
        constants::CACHE_KEY_PREFIX,
        user_id,
        hasher.finalize().to_hex()
    )
}

/// 页面数据缓存接口
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// 读取缓存，未命中返回 `Ok(None)`
    async fn get(
        &self,
        user_id: i64,
        params: &QueryParams,
    ) -> LibraryResult<Option<LibraryPageData>>;

    /// 写入缓存
    async fn set(
        &self,
        user_id: i64,
        params: &QueryParams,
        data: &LibraryPageData,
    ) -> LibraryResult<()>;
}

/// 缓存统计信息
#[derive(Debug, Clone, Default)]
pub struct CacheStoreStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub evictions: u64,
    /// 反序列化失败后被清除的损坏条目数
    pub corrupt_entries: u64,
}

impl CacheStoreStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn reset(&mut self) {
        *self = Default::default();
    }
}

struct StoredEntry {
    payload: String,
    stored_at: Instant,
}

/// 进程内页面数据缓存
///
/// 序列化整个页面数据存储（读取时反序列化，天然保证缓存往返
/// 等价于一次序列化往返）。容量由 LRU 策略约束，条目按 TTL 过期；
/// 损坏的条目在读取时被清除并按未命中处理。
pub struct MemoryCacheStore {
    entries: Mutex<LruCache<String, StoredEntry>>,
    ttl: Duration,
    stats: Mutex<CacheStoreStats>,
}

impl MemoryCacheStore {
    /// 创建指定容量与TTL的缓存
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            stats: Mutex::new(CacheStoreStats::default()),
        }
    }

    /// 使用默认配置创建缓存
    pub fn with_defaults() -> Self {
        Self::new(
            constants::DEFAULT_CACHE_CAPACITY,
            constants::DEFAULT_CACHE_TTL,
        )
    }

    /// 当前条目数
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 清空缓存
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    /// 清理过期条目，返回清除数量
    pub fn cleanup_expired(&self) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.stored_at.elapsed() > self.ttl)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            entries.pop(key);
        }

        let removed = expired.len();
        self.stats.lock().unwrap().evictions += removed as u64;
        removed
    }

    /// 获取统计信息快照
    pub fn stats(&self) -> CacheStoreStats {
        self.stats.lock().unwrap().clone()
    }

    /// 重置统计信息
    pub fn reset_stats(&self) {
        self.stats.lock().unwrap().reset();
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(
        &self,
        user_id: i64,
        params: &QueryParams,
    ) -> LibraryResult<Option<LibraryPageData>> {
        let key = cache_key(user_id, params);
        let mut entries = self.entries.lock().unwrap();

        let payload = match entries.get(&key) {
            None => {
                self.stats.lock().unwrap().misses += 1;
                return Ok(None);
            }
            Some(entry) if entry.stored_at.elapsed() > self.ttl => None,
            Some(entry) => Some(entry.payload.clone()),
        };

        let payload = match payload {
            Some(payload) => payload,
            None => {
                entries.pop(&key);
                let mut stats = self.stats.lock().unwrap();
                stats.misses += 1;
                stats.evictions += 1;
                return Ok(None);
            }
        };

        match serde_json::from_str::<LibraryPageData>(&payload) {
            Ok(data) => {
                self.stats.lock().unwrap().hits += 1;
                Ok(Some(data))
            }
            Err(error) => {
                // 损坏条目：清除并按未命中处理
                tracing::warn!("缓存条目损坏，已清除: {}", error);
                entries.pop(&key);
                let mut stats = self.stats.lock().unwrap();
                stats.misses += 1;
                stats.corrupt_entries += 1;
                Ok(None)
            }
        }
    }

    async fn set(
        &self,
        user_id: i64,
        params: &QueryParams,
        data: &LibraryPageData,
    ) -> LibraryResult<()> {
        let payload = serde_json::to_string(data)
            .map_err(|e| LibraryError::Serialization(format!("缓存序列化失败: {}", e)))?;
        let key = cache_key(user_id, params);

        let mut entries = self.entries.lock().unwrap();
        let evicted = entries.push(
            key.clone(),
            StoredEntry {
                payload,
                stored_at: Instant::now(),
            },
        );

        let mut stats = self.stats.lock().unwrap();
        stats.writes += 1;
        if let Some((evicted_key, _)) = evicted {
            if evicted_key != key {
                stats.evictions += 1;
            }
        }

        Ok(())
    }
}
