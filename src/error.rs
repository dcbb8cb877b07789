//! 图书馆核心统一错误处理
//!
//! 提供结构化错误类型和错误处理机制

use std::fmt;

use thiserror::Error;

use crate::validation::ValidationError;

/// 图书馆核心错误类型
#[derive(Error, Debug, Clone)]
pub enum LibraryError {
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 缓存基础设施错误（区别于缓存未命中，未命中不是错误）
    #[error("缓存错误: {0}")]
    Cache(String),

    /// 领域数据源错误
    #[error("数据源错误: {0}")]
    Provider(String),

    /// 输入数据校验错误
    #[error("数据校验失败: {0}")]
    Validation(ValidationError),

    /// 页面数据装配不变量被破坏（内部缺陷类错误）
    #[error("数据装配错误 [{category}/{key}]: {detail}")]
    Assembly {
        category: String,
        key: String,
        detail: String,
    },

    /// 序列化错误
    #[error("序列化错误: {0}")]
    Serialization(String),

    /// 超时错误
    #[error("操作超时: {0}")]
    Timeout(String),

    /// 并发操作错误
    #[error("并发操作错误: {0}")]
    Concurrency(String),

    /// 调用方取消了操作
    #[error("操作已取消")]
    Cancelled,

    /// 正则表达式编译错误
    #[error("正则表达式错误: {0}")]
    Pattern(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl LibraryError {
    /// 检查错误是否可重试
    pub fn is_retryable(&self) -> bool {
        match self {
            LibraryError::Cache(_) => true,
            LibraryError::Provider(_) => true,
            LibraryError::Timeout(_) => true,
            LibraryError::Concurrency(_) => true,
            LibraryError::Config(_) => false,
            LibraryError::Validation(_) => false,
            LibraryError::Assembly { .. } => false,
            LibraryError::Serialization(_) => false,
            LibraryError::Cancelled => false,
            LibraryError::Pattern(_) => false,
            LibraryError::InternalError(_) => false,
        }
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            LibraryError::Config(_) => ErrorSeverity::Critical,
            LibraryError::Cache(_) => ErrorSeverity::Warning,
            LibraryError::Provider(_) => ErrorSeverity::Error,
            LibraryError::Validation(_) => ErrorSeverity::Info,
            LibraryError::Assembly { .. } => ErrorSeverity::Critical,
            LibraryError::Serialization(_) => ErrorSeverity::Error,
            LibraryError::Timeout(_) => ErrorSeverity::Warning,
            LibraryError::Concurrency(_) => ErrorSeverity::Warning,
            LibraryError::Cancelled => ErrorSeverity::Info,
            LibraryError::Pattern(_) => ErrorSeverity::Error,
            LibraryError::InternalError(_) => ErrorSeverity::Critical,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            LibraryError::Config(_) => ErrorCategory::Configuration,
            LibraryError::Cache(_) => ErrorCategory::Cache,
            LibraryError::Provider(_) => ErrorCategory::Storage,
            LibraryError::Validation(_) => ErrorCategory::Input,
            LibraryError::Assembly { .. } => ErrorCategory::Assembly,
            LibraryError::Serialization(_) => ErrorCategory::Serialization,
            LibraryError::Timeout(_) => ErrorCategory::Timeout,
            LibraryError::Concurrency(_) => ErrorCategory::Concurrency,
            LibraryError::Cancelled => ErrorCategory::Cancellation,
            LibraryError::Pattern(_) => ErrorCategory::Pattern,
            LibraryError::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// 获取可以安全返回给调用方的错误消息
    ///
    /// 装配类和内部类错误不向不可信客户端透出细节，只返回通用消息；
    /// 完整细节由编排器记录到日志。
    pub fn public_message(&self) -> String {
        match self {
            LibraryError::Assembly { .. } | LibraryError::InternalError(_) => {
                "内部服务错误，请稍后重试".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    Cache,
    Storage,
    Input,
    Assembly,
    Serialization,
    Timeout,
    Concurrency,
    Cancellation,
    Pattern,
    Internal,
}

/// 标准错误转换
impl From<serde_json::Error> for LibraryError {
    fn from(error: serde_json::Error) -> Self {
        LibraryError::Serialization(format!("JSON序列化错误: {}", error))
    }
}

impl From<toml::de::Error> for LibraryError {
    fn from(error: toml::de::Error) -> Self {
        LibraryError::Config(format!("TOML解析错误: {}", error))
    }
}

impl From<tokio::time::error::Elapsed> for LibraryError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        LibraryError::Timeout(format!("异步操作超时: {}", error))
    }
}

impl From<ValidationError> for LibraryError {
    fn from(error: ValidationError) -> Self {
        LibraryError::Validation(error)
    }
}

/// 错误结果类型别名
pub type LibraryResult<T> = Result<T, LibraryError>;

/// 错误统计信息
#[derive(Debug, Clone, Default)]
pub struct ErrorStats {
    pub total_errors: usize,
    pub by_category: std::collections::HashMap<ErrorCategory, usize>,
    pub by_severity: std::collections::HashMap<ErrorSeverity, usize>,
    pub retryable_errors: usize,
    pub critical_errors: usize,
}

impl ErrorStats {
    /// 记录错误
    pub fn record_error(&mut self, error: &LibraryError) {
        self.total_errors += 1;

        *self.by_category.entry(error.category()).or_insert(0) += 1;

        let severity = error.severity();
        *self.by_severity.entry(severity).or_insert(0) += 1;

        if error.is_retryable() {
            self.retryable_errors += 1;
        }

        if severity == ErrorSeverity::Critical {
            self.critical_errors += 1;
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Default::default();
    }

    /// 获取错误率
    pub fn error_rate(&self, total_operations: usize) -> f64 {
        if total_operations == 0 {
            0.0
        } else {
            self.total_errors as f64 / total_operations as f64
        }
    }
}

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 记录并返回错误
    pub fn log_error<T>(error: LibraryError) -> LibraryResult<T> {
        match error.severity() {
            ErrorSeverity::Info => tracing::info!("图书馆信息: {}", error),
            ErrorSeverity::Warning => tracing::warn!("图书馆警告: {}", error),
            ErrorSeverity::Error => tracing::error!("图书馆错误: {}", error),
            ErrorSeverity::Critical => tracing::error!("图书馆严重错误: {}", error),
        }

        Err(error)
    }

    /// 创建缓存错误
    pub fn cache_error<T: fmt::Display>(msg: T) -> LibraryError {
        LibraryError::Cache(msg.to_string())
    }

    /// 创建配置错误
    pub fn config_error<T: fmt::Display>(msg: T) -> LibraryError {
        LibraryError::Config(msg.to_string())
    }

    /// 创建数据源错误
    pub fn provider_error<T: fmt::Display>(msg: T) -> LibraryError {
        LibraryError::Provider(msg.to_string())
    }

    /// 创建超时错误
    pub fn timeout_error<T: fmt::Display>(msg: T) -> LibraryError {
        LibraryError::Timeout(msg.to_string())
    }

    /// 创建内部错误
    pub fn internal_error<T: fmt::Display>(msg: T) -> LibraryError {
        LibraryError::InternalError(msg.to_string())
    }
}
