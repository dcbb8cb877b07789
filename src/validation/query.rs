//! 查询参数声明式校验
//!
//! 以每个参数一条规则的声明表取代反射式校验：必填、长度、取值枚举、
//! 类型和正则逐项显式检查。参数在进入编排器之前由调用层先行校验，
//! 所有违规会被收集成列表而不是短路返回。

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::models::{QueryParams, FORMAT_AUDIOBOOK, FORMAT_EBOOK, FORMAT_PHYSICAL};
use crate::validation::patterns::PatternCache;
use crate::validation::types::{ValidationError, ValidationResponse};

/// 参数值类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryParamType {
    #[default]
    String,
    Integer,
    Boolean,
}

/// 单个参数的校验规则
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryValidationRule {
    pub required: bool,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub allowed_values: Option<Vec<String>>,
    pub value_type: QueryParamType,
    pub pattern: Option<String>,
}

/// 按参数名组织的规则表
pub struct QueryValidationRules {
    rules: BTreeMap<String, QueryValidationRule>,
    patterns: Arc<PatternCache>,
}

impl QueryValidationRules {
    /// 从规则表创建
    pub fn new(rules: BTreeMap<String, QueryValidationRule>) -> Self {
        Self::with_pattern_cache(rules, Arc::new(PatternCache::with_defaults()))
    }

    /// 使用共享模式缓存创建
    pub fn with_pattern_cache(
        rules: BTreeMap<String, QueryValidationRule>,
        patterns: Arc<PatternCache>,
    ) -> Self {
        Self { rules, patterns }
    }

    /// 图书馆查询接口的默认规则表
    pub fn default_rules() -> Self {
        let mut rules = BTreeMap::new();

        rules.insert(
            "domain".to_string(),
            QueryValidationRule {
                allowed_values: Some(vec![
                    "library".to_string(),
                    "wishlist".to_string(),
                    "archive".to_string(),
                ]),
                ..Default::default()
            },
        );
        rules.insert(
            "sort".to_string(),
            QueryValidationRule {
                allowed_values: Some(vec![
                    "title".to_string(),
                    "author".to_string(),
                    "publishDate".to_string(),
                    "pageCount".to_string(),
                ]),
                ..Default::default()
            },
        );
        rules.insert(
            "order".to_string(),
            QueryValidationRule {
                allowed_values: Some(vec!["asc".to_string(), "desc".to_string()]),
                ..Default::default()
            },
        );
        rules.insert(
            "format".to_string(),
            QueryValidationRule {
                allowed_values: Some(vec![
                    FORMAT_PHYSICAL.to_string(),
                    FORMAT_EBOOK.to_string(),
                    FORMAT_AUDIOBOOK.to_string(),
                ]),
                ..Default::default()
            },
        );
        rules.insert(
            "search".to_string(),
            QueryValidationRule {
                min_length: Some(1),
                max_length: Some(200),
                ..Default::default()
            },
        );
        rules.insert(
            "page".to_string(),
            QueryValidationRule {
                value_type: QueryParamType::Integer,
                pattern: Some(r"^\d{1,5}$".to_string()),
                ..Default::default()
            },
        );
        rules.insert(
            "pageSize".to_string(),
            QueryValidationRule {
                value_type: QueryParamType::Integer,
                pattern: Some(r"^\d{1,3}$".to_string()),
                ..Default::default()
            },
        );

        Self::new(rules)
    }

    /// 校验参数集合，收集全部违规
    pub async fn validate(&self, params: &QueryParams) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // 不在规则表里的参数一律拒绝
        for name in params.keys() {
            if !self.rules.contains_key(name) {
                errors.push(ValidationError::new(
                    name.clone(),
                    "PARAMETER_UNKNOWN",
                    "不支持的查询参数",
                ));
            }
        }

        for (name, rule) in &self.rules {
            let value = match params.get(name) {
                Some(value) => value,
                None => {
                    if rule.required {
                        errors.push(ValidationError::new(
                            name.clone(),
                            "PARAMETER_REQUIRED",
                            "缺少必填查询参数",
                        ));
                    }
                    continue;
                }
            };

            if let Some(error) = self.check_value(name, value, rule).await {
                errors.push(error);
            }
        }

        errors
    }

    async fn check_value(
        &self,
        name: &str,
        value: &str,
        rule: &QueryValidationRule,
    ) -> Option<ValidationError> {
        match rule.value_type {
            QueryParamType::Integer => {
                if value.parse::<i64>().is_err() {
                    return Some(
                        ValidationError::new(name, "PARAMETER_TYPE_INVALID", "参数必须是整数")
                            .with_context("actual", value),
                    );
                }
            }
            QueryParamType::Boolean => {
                if value != "true" && value != "false" {
                    return Some(
                        ValidationError::new(name, "PARAMETER_TYPE_INVALID", "参数必须是布尔值")
                            .with_context("actual", value),
                    );
                }
            }
            QueryParamType::String => {}
        }

        let length = value.chars().count();
        if let Some(min) = rule.min_length {
            if length < min {
                return Some(
                    ValidationError::new(name, "PARAMETER_TOO_SHORT", "参数长度不足")
                        .with_context("minLength", min as i64)
                        .with_context("actualLength", length as i64),
                );
            }
        }
        if let Some(max) = rule.max_length {
            if length > max {
                return Some(
                    ValidationError::new(name, "PARAMETER_TOO_LONG", "参数长度超限")
                        .with_context("maxLength", max as i64)
                        .with_context("actualLength", length as i64),
                );
            }
        }

        if let Some(allowed) = &rule.allowed_values {
            if !allowed.iter().any(|candidate| candidate == value) {
                return Some(
                    ValidationError::new(name, "PARAMETER_VALUE_NOT_ALLOWED", "参数取值无效")
                        .with_context("allowed", serde_json::json!(allowed))
                        .with_context("actual", value),
                );
            }
        }

        if let Some(pattern) = &rule.pattern {
            match self.patterns.get(pattern).await {
                Ok(compiled) => {
                    if !compiled.is_match(value) {
                        return Some(
                            ValidationError::new(
                                name,
                                "PARAMETER_PATTERN_MISMATCH",
                                "参数格式不符合要求",
                            )
                            .with_context("pattern", pattern.clone())
                            .with_context("actual", value),
                        );
                    }
                }
                Err(error) => {
                    return Some(ValidationError::new(
                        name,
                        "VALIDATION_INTERNAL",
                        format!("模式编译失败: {}", error),
                    ));
                }
            }
        }

        None
    }

    /// 校验并包装成统一响应
    pub async fn validate_response(&self, params: &QueryParams) -> ValidationResponse {
        let errors = self.validate(params).await;
        if errors.is_empty() {
            ValidationResponse::success(None)
        } else {
            ValidationResponse::failure(errors)
        }
    }
}
