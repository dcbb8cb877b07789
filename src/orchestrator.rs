//! 图书馆数据编排器
//!
//! 旁路缓存（cache-aside）协调器：读缓存 → 未命中取数 → 组织 →
//! 结构校验 → 尽力写缓存 → 构建响应信封。缓存只是优化，永远不是
//! 正确性依赖；编排器是唯一决定对调用方可见行为的层。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::cancel::CancelToken;
use crate::config::{constants, LibraryConfig};
use crate::error::{LibraryError, LibraryResult};
use crate::models::{
    Book, DataSource, LibraryPageData, LibraryResponse, QueryParams, FORMAT_PHYSICAL,
};
use crate::organizer::LibraryOrganizer;
use crate::storage::{CacheStore, DomainDataProvider};
use crate::validation::StructuralValidator;

/// 编排器配置
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// 缓存写入的时间上限
    pub cache_write_timeout: Duration,
    /// 写缓存是否作为后台任务分离执行（响应不等待写入完成）
    pub background_cache_write: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            cache_write_timeout: constants::DEFAULT_CACHE_WRITE_TIMEOUT,
            background_cache_write: false,
        }
    }
}

impl From<&LibraryConfig> for OrchestratorConfig {
    fn from(config: &LibraryConfig) -> Self {
        Self {
            cache_write_timeout: config.cache_write_timeout(),
            background_cache_write: config.cache.background_write,
        }
    }
}

/// 编排过程统计
#[derive(Debug, Clone, Default)]
pub struct OrchestratorStats {
    pub requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_write_failures: u64,
    /// 缓存数据未通过结构校验而回退数据库的次数
    pub corrupt_cache_payloads: u64,
    /// 缺失页面数据被兜底替换的次数
    pub degraded_responses: u64,
    pub total_time: Duration,
}

impl OrchestratorStats {
    pub fn reset(&mut self) {
        *self = Default::default();
    }
}

/// 健康级别
#[derive(Debug, Clone, PartialEq)]
pub enum HealthLevel {
    Healthy,
    Degraded,
    Unhealthy,
}

/// 健康状态
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub overall: HealthLevel,
    pub components: HashMap<String, HealthLevel>,
}

/// 图书馆数据编排器
pub struct LibraryOrchestrator {
    cache: Arc<dyn CacheStore>,
    provider: Arc<dyn DomainDataProvider>,
    organizer: LibraryOrganizer,
    structural: StructuralValidator,
    config: OrchestratorConfig,
    stats: Mutex<OrchestratorStats>,
}

impl LibraryOrchestrator {
    /// 创建使用默认配置的编排器
    pub fn new(cache: Arc<dyn CacheStore>, provider: Arc<dyn DomainDataProvider>) -> Self {
        Self::with_config(cache, provider, OrchestratorConfig::default())
    }

    /// 创建指定配置的编排器
    pub fn with_config(
        cache: Arc<dyn CacheStore>,
        provider: Arc<dyn DomainDataProvider>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            cache,
            provider,
            organizer: LibraryOrganizer::new(),
            structural: StructuralValidator::new(),
            config,
            stats: Mutex::new(OrchestratorStats::default()),
        }
    }

    /// 获取指定用户组织好的图书馆数据
    ///
    /// 缓存命中的载荷也会重新做结构校验并归一化后才返回；
    /// 未通过校验的缓存载荷按损坏处理，回退到数据库路径。
    /// 调用方拿到的 `data` 永远是结构完整的，绝不为空引用。
    pub async fn get_library_data(
        &self,
        user_id: i64,
        params: &QueryParams,
        cancel: &CancelToken,
    ) -> LibraryResult<LibraryResponse> {
        let start = Instant::now();
        self.stats.lock().unwrap().requests += 1;

        if cancel.is_cancelled() {
            return Err(LibraryError::Cancelled);
        }

        // 第一步：读缓存。未命中是控制流分支；真实故障中止本次调用。
        let cached = tokio::select! {
            _ = cancel.cancelled() => return Err(LibraryError::Cancelled),
            result = self.cache.get(user_id, params) => {
                result.map_err(|e| LibraryError::Cache(format!("读取缓存失败: {}", e)))?
            }
        };

        let mut source = DataSource::Database;
        let mut data: Option<LibraryPageData> = None;

        if let Some(mut page) = cached {
            match self.structural.validate(&mut page) {
                Ok(()) => {
                    tracing::debug!("缓存命中: user_id={}", user_id);
                    self.stats.lock().unwrap().cache_hits += 1;
                    source = DataSource::Cache;
                    data = Some(page);
                }
                Err(error) => {
                    tracing::error!("缓存载荷未通过结构校验，按未命中处理: {}", error);
                    self.stats.lock().unwrap().corrupt_cache_payloads += 1;
                }
            }
        }

        if data.is_none() {
            self.stats.lock().unwrap().cache_misses += 1;

            // 第二步：取数。数据源错误原样向上传播，编排器不做重试。
            let raw = tokio::select! {
                _ = cancel.cancelled() => return Err(LibraryError::Cancelled),
                result = self.provider.get_data(user_id, params) => result?,
            };

            // 第三步：组织并校验装配结果。结构违规属于内部缺陷，
            // 完整细节只进日志，对外只给通用错误。
            let mut page = self.organizer.process(raw)?;
            if let Err(error) = self.structural.validate(&mut page) {
                tracing::error!("页面数据装配校验失败: {}", error);
                return Err(LibraryError::InternalError(error.public_message()));
            }

            // 第四步：尽力写缓存，失败只记日志，绝不影响本次请求。
            self.write_cache(user_id, params, &page, cancel).await;

            data = Some(page);
            source = DataSource::Database;
        }

        // 第五步：构建信封。页面数据缺失时兜底为空结构并记录异常。
        let mut page = data.unwrap_or_else(|| {
            tracing::error!("编排结果缺少页面数据，返回空结构: user_id={}", user_id);
            self.stats.lock().unwrap().degraded_responses += 1;
            LibraryPageData::new()
        });

        normalize_page_data(&mut page);

        self.stats.lock().unwrap().total_time += start.elapsed();

        Ok(LibraryResponse {
            request_id: uuid::Uuid::new_v4().to_string(),
            data: page,
            source,
        })
    }

    /// 尽力而为的缓存写入
    ///
    /// 取消信号触发后不再写入。后台模式下写入作为分离任务执行，
    /// 自带超时；响应不等待它完成。
    async fn write_cache(
        &self,
        user_id: i64,
        params: &QueryParams,
        page: &LibraryPageData,
        cancel: &CancelToken,
    ) {
        if cancel.is_cancelled() {
            tracing::debug!("调用已取消，跳过缓存写入: user_id={}", user_id);
            return;
        }

        if self.config.background_cache_write {
            let cache = Arc::clone(&self.cache);
            let params = params.clone();
            let page = page.clone();
            let write_timeout = self.config.cache_write_timeout;
            tokio::spawn(async move {
                match tokio::time::timeout(write_timeout, cache.set(user_id, &params, &page)).await
                {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => {
                        tracing::warn!("后台缓存写入失败（忽略）: {}", error);
                    }
                    Err(_) => {
                        tracing::warn!("后台缓存写入超时（忽略）: user_id={}", user_id);
                    }
                }
            });
            return;
        }

        match tokio::time::timeout(
            self.config.cache_write_timeout,
            self.cache.set(user_id, params, page),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                tracing::warn!("缓存写入失败（忽略）: {}", error);
                self.stats.lock().unwrap().cache_write_failures += 1;
            }
            Err(_) => {
                tracing::warn!("缓存写入超时（忽略）: user_id={}", user_id);
                self.stats.lock().unwrap().cache_write_failures += 1;
            }
        }
    }

    /// 获取统计信息快照
    pub fn stats(&self) -> OrchestratorStats {
        self.stats.lock().unwrap().clone()
    }

    /// 重置统计信息
    pub fn reset_stats(&self) {
        self.stats.lock().unwrap().reset();
    }

    /// 健康检查
    pub async fn health_check(&self) -> HealthStatus {
        let stats = self.stats();
        let mut status = HealthStatus {
            overall: HealthLevel::Healthy,
            components: HashMap::new(),
        };

        let cache_level = if stats.requests > 0 && stats.cache_write_failures * 2 > stats.requests {
            HealthLevel::Degraded
        } else {
            HealthLevel::Healthy
        };
        if cache_level == HealthLevel::Degraded {
            status.overall = HealthLevel::Degraded;
        }
        status.components.insert("cache".to_string(), cache_level);

        let assembly_level = if stats.degraded_responses > 0 || stats.corrupt_cache_payloads > 0 {
            HealthLevel::Degraded
        } else {
            HealthLevel::Healthy
        };
        if assembly_level == HealthLevel::Degraded {
            status.overall = HealthLevel::Degraded;
        }
        status
            .components
            .insert("assembly".to_string(), assembly_level);

        status
    }
}

/// 对信封中出现的每本图书做归一化
///
/// 保证前端契约总能被满足：简介、出版日期、封面链接非空，
/// 形态列表至少包含一项。
pub fn normalize_page_data(data: &mut LibraryPageData) {
    data.for_each_book_mut(normalize_book);
}

/// 归一化单本图书的缺失字段
pub fn normalize_book(book: &mut Book) {
    if book.description.trim().is_empty() {
        book.description = constants::DEFAULT_DESCRIPTION_HTML.to_string();
    }
    if book.publish_date.trim().is_empty() {
        book.publish_date = constants::DEFAULT_PUBLISH_DATE.to_string();
    }
    if book.image_link.trim().is_empty() {
        book.image_link = constants::DEFAULT_COVER_IMAGE.to_string();
    }
    if book.formats.is_empty() {
        book.formats.push(FORMAT_PHYSICAL.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_book_fills_missing_fields() {
        let mut book = Book {
            id: 1,
            title: "待归一化".to_string(),
            ..Default::default()
        };
        normalize_book(&mut book);

        assert_eq!(book.description, constants::DEFAULT_DESCRIPTION_HTML);
        assert_eq!(book.publish_date, constants::DEFAULT_PUBLISH_DATE);
        assert_eq!(book.image_link, constants::DEFAULT_COVER_IMAGE);
        assert_eq!(book.formats, vec![FORMAT_PHYSICAL.to_string()]);
    }

    #[test]
    fn test_normalize_book_keeps_present_fields() {
        let mut book = Book {
            id: 2,
            description: "<p>已有简介</p>".to_string(),
            publish_date: "2020-01-01".to_string(),
            image_link: "/covers/2.jpg".to_string(),
            formats: vec!["eBook".to_string()],
            ..Default::default()
        };
        normalize_book(&mut book);

        assert_eq!(book.description, "<p>已有简介</p>");
        assert_eq!(book.publish_date, "2020-01-01");
        assert_eq!(book.formats, vec!["eBook".to_string()]);
    }
}
