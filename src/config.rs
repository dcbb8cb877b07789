//! 图书馆核心配置管理
//!
//! 提供统一的配置接口，支持文件配置、环境变量和默认值。
//! 所有可变行为都通过显式配置注入构造函数，不依赖进程级全局状态。

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LibraryError, LibraryResult};

/// 核心常量定义
pub mod constants {
    use std::time::Duration;

    // 字段格式规则
    pub const TITLE_PATTERN: &str = r"^[\p{L}\p{N}\p{P}\p{Zs}]+$";
    pub const LANGUAGE_PATTERN: &str = r"^[a-z]{2}(-[A-Z]{2})?$";
    pub const ISBN10_PATTERN: &str = r"^\d{9}[\dX]$";
    pub const ISBN13_PATTERN: &str = r"^\d{13}$";

    // 字段范围规则
    pub const MAX_TITLE_LENGTH: usize = 512;
    pub const MAX_AUTHORS: usize = 20;
    pub const MAX_GENRES: usize = 20;
    pub const MAX_TAGS: usize = 50;
    pub const MAX_PAGE_COUNT: i64 = 50_000;

    // 批量校验
    pub const SMALL_BATCH_THRESHOLD: usize = 10;
    pub const DEFAULT_MAX_CONCURRENT_VALIDATIONS: usize = 5;

    // 正则模式缓存
    pub const DEFAULT_MAX_PATTERNS: usize = 64;
    pub const DEFAULT_COMPILE_TIMEOUT: Duration = Duration::from_secs(2);

    // 页面数据缓存
    pub const DEFAULT_CACHE_CAPACITY: usize = 1024;
    pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);
    pub const DEFAULT_CACHE_WRITE_TIMEOUT: Duration = Duration::from_secs(3);
    pub const CACHE_KEY_PREFIX: &str = "bookshelf:library:";

    // 响应归一化兜底值
    pub const DEFAULT_DESCRIPTION_HTML: &str = "<p>暂无简介</p>";
    pub const DEFAULT_PUBLISH_DATE: &str = "Unknown";
    pub const DEFAULT_COVER_IMAGE: &str = "/assets/images/default-cover.svg";

    // 配置文件查找路径
    pub const CONFIG_PATHS: &[&str] = &[
        "./bookshelf.toml",
        "~/.config/bookshelf/config.toml",
        "/etc/bookshelf/config.toml",
    ];
}

/// 缓存配置段
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub capacity: usize,
    pub ttl_secs: u64,
    pub write_timeout_secs: u64,
    /// 缓存写入是否作为后台任务执行（响应不等待写入完成）
    pub background_write: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: constants::DEFAULT_CACHE_CAPACITY,
            ttl_secs: constants::DEFAULT_CACHE_TTL.as_secs(),
            write_timeout_secs: constants::DEFAULT_CACHE_WRITE_TIMEOUT.as_secs(),
            background_write: false,
        }
    }
}

/// 校验配置段
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    pub max_title_length: usize,
    pub max_authors: usize,
    pub max_genres: usize,
    pub max_tags: usize,
    pub max_page_count: i64,
    pub small_batch_threshold: usize,
    pub max_concurrent_validations: usize,
    /// 每个校验单元的节流延迟（毫秒），0 表示不节流
    pub validation_delay_ms: u64,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            max_title_length: constants::MAX_TITLE_LENGTH,
            max_authors: constants::MAX_AUTHORS,
            max_genres: constants::MAX_GENRES,
            max_tags: constants::MAX_TAGS,
            max_page_count: constants::MAX_PAGE_COUNT,
            small_batch_threshold: constants::SMALL_BATCH_THRESHOLD,
            max_concurrent_validations: constants::DEFAULT_MAX_CONCURRENT_VALIDATIONS,
            validation_delay_ms: 0,
        }
    }
}

/// 正则模式缓存配置段
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternSettings {
    pub max_patterns: usize,
    pub compile_timeout_secs: u64,
}

impl Default for PatternSettings {
    fn default() -> Self {
        Self {
            max_patterns: constants::DEFAULT_MAX_PATTERNS,
            compile_timeout_secs: constants::DEFAULT_COMPILE_TIMEOUT.as_secs(),
        }
    }
}

/// 图书馆核心配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub cache: CacheSettings,
    pub validation: ValidationSettings,
    pub patterns: PatternSettings,
}

impl LibraryConfig {
    /// 验证配置
    pub fn validate(&self) -> LibraryResult<()> {
        if self.cache.enabled && self.cache.capacity == 0 {
            return Err(LibraryError::Config(
                "启用缓存时缓存容量不能为0".to_string(),
            ));
        }

        if self.validation.max_concurrent_validations == 0 {
            return Err(LibraryError::Config("最大并发校验数不能为0".to_string()));
        }

        if self.validation.small_batch_threshold == 0 {
            return Err(LibraryError::Config("小批量阈值不能为0".to_string()));
        }

        if self.patterns.max_patterns == 0 {
            return Err(LibraryError::Config("模式缓存上限不能为0".to_string()));
        }

        Ok(())
    }

    /// 应用环境变量覆盖
    pub fn apply_env_overrides(&mut self) {
        use crate::env::{cache, validation, EnvVar};

        if let Ok(enabled) = cache::Enabled::get() {
            self.cache.enabled = enabled;
        }

        if let Ok(capacity) = cache::Capacity::get() {
            self.cache.capacity = capacity;
            tracing::info!("环境变量覆盖缓存容量: {}", capacity);
        }

        if let Ok(ttl) = cache::Ttl::get() {
            self.cache.ttl_secs = ttl.as_secs();
        }

        if let Ok(max_concurrent) = validation::MaxConcurrent::get() {
            self.validation.max_concurrent_validations = max_concurrent;
        }

        if let Ok(threshold) = validation::SmallBatchThreshold::get() {
            self.validation.small_batch_threshold = threshold;
        }
    }

    /// 转换为Duration类型
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    pub fn cache_write_timeout(&self) -> Duration {
        Duration::from_secs(self.cache.write_timeout_secs)
    }

    pub fn compile_timeout(&self) -> Duration {
        Duration::from_secs(self.patterns.compile_timeout_secs)
    }

    pub fn validation_delay(&self) -> Duration {
        Duration::from_millis(self.validation.validation_delay_ms)
    }
}

/// 配置管理器
pub struct ConfigManager {
    config: LibraryConfig,
}

impl ConfigManager {
    /// 创建新的配置管理器
    pub fn new() -> LibraryResult<Self> {
        let mut config = Self::load_config()?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(Self { config })
    }

    /// 获取配置
    pub fn get_config(&self) -> &LibraryConfig {
        &self.config
    }

    /// 获取默认配置
    pub fn default_config() -> LibraryConfig {
        LibraryConfig::default()
    }

    /// 从文件加载配置
    fn load_config() -> LibraryResult<LibraryConfig> {
        Self::load_dotenv();

        for path in constants::CONFIG_PATHS {
            let expanded_path = shellexpand::tilde(path);
            if Path::new(expanded_path.as_ref()).exists() {
                tracing::info!("加载配置文件: {}", expanded_path);
                return Self::load_from_file(&expanded_path);
            }
        }

        tracing::info!("未找到配置文件，使用默认配置");
        Ok(LibraryConfig::default())
    }

    /// 从指定文件加载配置
    fn load_from_file(path: &str) -> LibraryResult<LibraryConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LibraryError::Config(format!("读取配置文件失败: {}", e)))?;

        if path.ends_with(".toml") {
            toml::from_str(&content)
                .map_err(|e| LibraryError::Config(format!("解析TOML配置失败: {}", e)))
        } else {
            serde_json::from_str(&content)
                .map_err(|e| LibraryError::Config(format!("解析JSON配置失败: {}", e)))
        }
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        let env_files = [".env.local", ".env.development", ".env.production", ".env"];

        for env_file in &env_files {
            if Path::new(env_file).exists() {
                if dotenv::from_filename(env_file).is_ok() {
                    tracing::info!("已加载环境变量文件: {}", env_file);
                    break;
                }
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config(path: &str) -> LibraryResult<()> {
        let config = LibraryConfig::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| LibraryError::Config(format!("序列化配置失败: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| LibraryError::Config(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }
}
