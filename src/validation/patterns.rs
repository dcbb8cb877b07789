//! 线程安全的正则模式缓存
//!
//! 字段校验使用的正则只编译一次后复用。读锁走快路径，写路径做
//! 双重检查；缓存有硬性容量上限，超限后照常编译但不再驻留，
//! 防止无界增长。编译本身在独立阻塞任务中执行并受超时约束，
//! 病态模式不会无限期拖住调用方。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use regex::Regex;

use crate::config::constants;
use crate::error::{LibraryError, LibraryResult};

/// 模式缓存统计信息
#[derive(Debug, Clone, Default)]
pub struct PatternCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub compilations: u64,
    /// 容量压力下未驻留缓存的编译次数
    pub uncached_compilations: u64,
}

impl PatternCacheStats {
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

/// 编译一次的正则模式缓存
pub struct PatternCache {
    patterns: RwLock<HashMap<String, Arc<Regex>>>,
    max_patterns: usize,
    compile_timeout: Duration,
    stats: Mutex<PatternCacheStats>,
}

impl PatternCache {
    /// 创建指定容量与编译超时的缓存
    pub fn new(max_patterns: usize, compile_timeout: Duration) -> Self {
        Self {
            patterns: RwLock::new(HashMap::new()),
            max_patterns,
            compile_timeout,
            stats: Mutex::new(PatternCacheStats::default()),
        }
    }

    /// 使用默认配置创建缓存
    pub fn with_defaults() -> Self {
        Self::new(
            constants::DEFAULT_MAX_PATTERNS,
            constants::DEFAULT_COMPILE_TIMEOUT,
        )
    }

    /// 获取编译后的模式
    ///
    /// 命中时直接返回缓存实例；未命中时编译并（容量允许的前提下）驻留。
    /// 容量已满时返回的模式仍然可用，只是不会被缓存。
    pub async fn get(&self, pattern: &str) -> LibraryResult<Arc<Regex>> {
        // 快路径：读锁检查
        {
            let patterns = self.patterns.read().unwrap();
            if let Some(compiled) = patterns.get(pattern) {
                self.stats.lock().unwrap().hits += 1;
                return Ok(Arc::clone(compiled));
            }
        }
        self.stats.lock().unwrap().misses += 1;

        // 读锁下复查容量：超限后编译但不驻留
        let at_capacity = {
            let patterns = self.patterns.read().unwrap();
            patterns.len() >= self.max_patterns
        };
        if at_capacity {
            tracing::warn!(
                "模式缓存已达上限 {}，\"{}\" 编译后不驻留",
                self.max_patterns,
                pattern
            );
            let compiled = self.compile(pattern).await?;
            self.stats.lock().unwrap().uncached_compilations += 1;
            return Ok(compiled);
        }

        // 编译在锁外进行：std 读写锁的守卫不能跨越 await 持有
        let compiled = self.compile(pattern).await?;

        // 写锁下双重检查：其他调用方可能已经先完成了编译
        let mut patterns = self.patterns.write().unwrap();
        if let Some(existing) = patterns.get(pattern) {
            return Ok(Arc::clone(existing));
        }
        if patterns.len() >= self.max_patterns {
            tracing::warn!("模式缓存在编译期间被填满，\"{}\" 不驻留", pattern);
            self.stats.lock().unwrap().uncached_compilations += 1;
            return Ok(compiled);
        }
        patterns.insert(pattern.to_string(), Arc::clone(&compiled));
        self.stats.lock().unwrap().compilations += 1;

        Ok(compiled)
    }

    /// 带超时约束的编译
    ///
    /// 阻塞线程无法被强行中断；超时后结果被丢弃，调用方立即解除等待。
    async fn compile(&self, pattern: &str) -> LibraryResult<Arc<Regex>> {
        let source = pattern.to_string();
        let task = tokio::task::spawn_blocking(move || Regex::new(&source));

        match tokio::time::timeout(self.compile_timeout, task).await {
            Err(_) => Err(LibraryError::Timeout(format!(
                "正则编译超时({:?}): {}",
                self.compile_timeout, pattern
            ))),
            Ok(Err(join_error)) => Err(LibraryError::Concurrency(format!(
                "正则编译任务异常退出: {}",
                join_error
            ))),
            Ok(Ok(Err(regex_error))) => Err(LibraryError::Pattern(format!(
                "正则编译失败 \"{}\": {}",
                pattern, regex_error
            ))),
            Ok(Ok(Ok(compiled))) => Ok(Arc::new(compiled)),
        }
    }

    /// 当前驻留的模式数
    pub fn len(&self) -> usize {
        self.patterns.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 清空缓存
    pub fn clear(&self) {
        self.patterns.write().unwrap().clear();
    }

    /// 获取统计信息快照
    pub fn stats(&self) -> PatternCacheStats {
        self.stats.lock().unwrap().clone()
    }
}

impl Default for PatternCache {
    fn default() -> Self {
        Self::with_defaults()
    }
}
