//! 校验结果类型与运行指标
//!
//! 以显式类型取代反射式标签校验：每条失败都携带字段、错误码、
//! 消息和开放的上下文键值袋，可聚合进统一的校验响应。

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 单条校验错误
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    pub field: String,
    pub code: String,
    pub message: String,
    /// 诊断用开放键值袋（如允许的取值、实际取值）
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl ValidationError {
    pub fn new(
        field: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
            context: HashMap::new(),
        }
    }

    /// 附加上下文信息
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.field, self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// 聚合的校验响应
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    pub request_id: String,
    pub success: bool,
    pub errors: Vec<ValidationError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl ValidationResponse {
    /// 构建成功响应
    pub fn success(data: Option<serde_json::Value>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            success: true,
            errors: Vec::new(),
            data,
            timestamp: Utc::now(),
        }
    }

    /// 构建失败响应
    pub fn failure(errors: Vec<ValidationError>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            success: false,
            errors,
            data: None,
            timestamp: Utc::now(),
        }
    }
}

/// 校验运行指标
///
/// 每个校验器实例持有一份，工作协程并发累加（外层加独立互斥锁），
/// 只能通过显式 [`cleanup`](Self::cleanup) 重置。
#[derive(Debug, Clone, Default)]
pub struct ValidationMetrics {
    pub valid_count: u64,
    pub invalid_count: u64,
    /// 按错误码的失败计数
    pub error_codes: HashMap<String, u64>,
    pub total_duration: Duration,
    pub max_duration: Duration,
    /// 当前在执行中的校验单元数
    pub in_flight: usize,
    /// 观测到的最大并发校验数
    pub peak_concurrent: usize,
}

impl ValidationMetrics {
    /// 记录一次通过的校验
    pub fn record_valid(&mut self, duration: Duration) {
        self.valid_count += 1;
        self.record_duration(duration);
    }

    /// 记录一次失败的校验
    pub fn record_invalid(&mut self, code: &str, duration: Duration) {
        self.invalid_count += 1;
        *self.error_codes.entry(code.to_string()).or_insert(0) += 1;
        self.record_duration(duration);
    }

    fn record_duration(&mut self, duration: Duration) {
        self.total_duration += duration;
        if duration > self.max_duration {
            self.max_duration = duration;
        }
    }

    /// 工作单元开始执行
    pub fn worker_started(&mut self) {
        self.in_flight += 1;
        if self.in_flight > self.peak_concurrent {
            self.peak_concurrent = self.in_flight;
        }
    }

    /// 工作单元执行结束
    pub fn worker_finished(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// 平均单次校验耗时
    pub fn avg_duration(&self) -> Duration {
        let total = self.valid_count + self.invalid_count;
        if total == 0 {
            Duration::ZERO
        } else {
            self.total_duration / total as u32
        }
    }

    /// 显式重置全部计数
    pub fn cleanup(&mut self) {
        *self = Default::default();
    }
}
