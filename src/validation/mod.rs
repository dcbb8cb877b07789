//! 校验子系统
//!
//! 按职责拆分的四个校验层：
//! - **types**: 结构化错误、聚合响应与运行指标
//! - **patterns**: 线程安全的编译一次正则缓存
//! - **content**: 入库路径上的逐本字段校验与批量校验
//! - **structural**: 页面数据跨集合一致性校验
//! - **query**: 查询参数的声明式规则校验

/// 校验结果类型与运行指标
pub mod types;

/// 正则模式缓存
pub mod patterns;

/// 图书内容校验
pub mod content;

/// 页面结构一致性校验
pub mod structural;

/// 查询参数校验
pub mod query;

pub use content::{ContentValidator, ValidatorConfig};
pub use patterns::{PatternCache, PatternCacheStats};
pub use query::{QueryParamType, QueryValidationRule, QueryValidationRules};
pub use structural::StructuralValidator;
pub use types::{ValidationError, ValidationMetrics, ValidationResponse};
