//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量访问，用于覆盖配置文件中的取值。
//! 取代原先进程级"运行模式"全局状态：模式只通过显式配置注入。

use std::env;
use std::fmt;
use std::time::Duration;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Environment variable '{}': {}",
            self.variable, self.message
        )
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => Err(EnvError {
                variable: Self::NAME.to_string(),
                message: "Environment variable not set".to_string(),
            }),
        }
    }
}

fn parse_usize(name: &str, value: &str) -> EnvResult<usize> {
    value.parse::<usize>().map_err(|_| EnvError {
        variable: name.to_string(),
        message: format!("Invalid number '{}'", value),
    })
}

fn parse_bool(name: &str, value: &str) -> EnvResult<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(EnvError {
            variable: name.to_string(),
            message: format!("Invalid boolean '{}'. Use: true, false", value),
        }),
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 应用运行模式
    pub struct Mode;
    impl EnvVar<String> for Mode {
        const NAME: &'static str = "BOOKSHELF_MODE";
        const DESCRIPTION: &'static str = "Application mode: development, staging, production";

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("production".to_string()),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "development" | "dev" => Ok("development".to_string()),
                "staging" | "stage" => Ok("staging".to_string()),
                "production" | "prod" => Ok("production".to_string()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid mode '{}'. Use: development, staging, production",
                        value
                    ),
                }),
            }
        }
    }

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "BOOKSHELF_LOG_LEVEL";
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("info".to_string()),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(value.to_lowercase()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }
}

/// 缓存相关环境变量
pub mod cache {
    use super::*;

    /// 是否启用缓存
    pub struct Enabled;
    impl EnvVar<bool> for Enabled {
        const NAME: &'static str = "BOOKSHELF_CACHE_ENABLED";
        const DESCRIPTION: &'static str = "Enable the library data cache";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(Self::NAME, value)
        }
    }

    /// 本地缓存容量
    pub struct Capacity;
    impl EnvVar<usize> for Capacity {
        const NAME: &'static str = "BOOKSHELF_CACHE_CAPACITY";
        const DESCRIPTION: &'static str = "Maximum number of cached library pages";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_usize(Self::NAME, value)
        }
    }

    /// 缓存条目存活时间
    pub struct Ttl;
    impl EnvVar<Duration> for Ttl {
        const NAME: &'static str = "BOOKSHELF_CACHE_TTL_SECS";
        const DESCRIPTION: &'static str = "Cache entry time-to-live in seconds";

        fn parse(value: &str) -> EnvResult<Duration> {
            parse_usize(Self::NAME, value).map(|secs| Duration::from_secs(secs as u64))
        }
    }
}

/// 校验相关环境变量
pub mod validation {
    use super::*;

    /// 批量校验最大并发数
    pub struct MaxConcurrent;
    impl EnvVar<usize> for MaxConcurrent {
        const NAME: &'static str = "BOOKSHELF_VALIDATION_MAX_CONCURRENT";
        const DESCRIPTION: &'static str = "Bounded worker pool size for batch validation";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_usize(Self::NAME, value)
        }
    }

    /// 小批量顺序处理阈值
    pub struct SmallBatchThreshold;
    impl EnvVar<usize> for SmallBatchThreshold {
        const NAME: &'static str = "BOOKSHELF_VALIDATION_SMALL_BATCH";
        const DESCRIPTION: &'static str = "Batches below this size validate sequentially";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_usize(Self::NAME, value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse() {
        assert_eq!(core::Mode::parse("dev").unwrap(), "development");
        assert_eq!(core::Mode::parse("PROD").unwrap(), "production");
        assert!(core::Mode::parse("invalid").is_err());
    }

    #[test]
    fn test_bool_parse() {
        assert!(cache::Enabled::parse("true").unwrap());
        assert!(!cache::Enabled::parse("off").unwrap());
        assert!(cache::Enabled::parse("maybe").is_err());
    }

    #[test]
    fn test_ttl_parse() {
        assert_eq!(cache::Ttl::parse("90").unwrap(), Duration::from_secs(90));
        assert!(cache::Ttl::parse("ninety").is_err());
    }
}
