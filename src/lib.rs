//! # Bookshelf Library
//!
//! 个人图书馆追踪器的数据编排与校验核心：回答"把这个用户的图书馆
//! 按展示需要组织好给我"，协调缓存、取数、组织和正确性校验。
//!
//! ## 模块组织
//!
//! - `config` - 配置结构、常量与配置管理器
//! - `env` - 类型安全的环境变量访问
//! - `error` - 统一错误类型与分类
//! - `models` - 图书实体、页面数据与响应信封
//! - `cancel` - 显式取消信号
//! - `organizer` - 扁平结果到分类视图的重塑
//! - `orchestrator` - 旁路缓存协调器与响应归一化
//! - `storage` - 缓存与领域数据源接口
//! - `validation` - 内容、结构与查询参数校验

pub mod cancel;
pub mod config;
pub mod env;
pub mod error;
pub mod models;
pub mod organizer;
pub mod orchestrator;
pub mod storage;
pub mod validation;

// Re-export commonly used items for convenience
pub use cancel::CancelToken;
pub use config::{ConfigManager, LibraryConfig};
pub use error::{LibraryError, LibraryResult};
pub use models::{
    Book, DataSource, LibraryPageData, LibraryResponse, QueryParams, RawLibraryData,
};
pub use orchestrator::{
    normalize_book, normalize_page_data, HealthLevel, HealthStatus, LibraryOrchestrator,
    OrchestratorConfig,
};
pub use organizer::LibraryOrganizer;
pub use storage::{CacheStore, DomainDataProvider, MemoryCacheStore, StaticDataProvider};
pub use validation::{
    ContentValidator, PatternCache, QueryValidationRules, StructuralValidator, ValidationError,
    ValidationMetrics, ValidationResponse, ValidatorConfig,
};
