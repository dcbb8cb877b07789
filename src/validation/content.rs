//! 图书内容校验器
//!
//! 入库路径（创建/导入）上的逐本字段校验，以及带并发上限的批量校验。
//! 校验顺序固定：必填字段 → 格式规则 → 数量规则，首个失败即短路返回，
//! 每次结果都会累计到运行指标。

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::future::join_all;
use regex::Regex;
use tokio::sync::{mpsc, Semaphore};

use crate::cancel::CancelToken;
use crate::config::{constants, LibraryConfig};
use crate::error::{LibraryError, LibraryResult};
use crate::models::{Book, KNOWN_FORMATS};
use crate::validation::patterns::PatternCache;
use crate::validation::types::{ValidationError, ValidationMetrics};

/// 内容校验配置
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    pub max_title_length: usize,
    pub max_authors: usize,
    pub max_genres: usize,
    pub max_tags: usize,
    pub max_page_count: i64,
    /// 低于该规模的批量走顺序校验，省去并发开销
    pub small_batch_threshold: usize,
    /// 批量校验的并发上限
    pub max_concurrent_validations: usize,
    /// 每个校验单元的节流延迟，零表示不节流
    pub validation_delay: Duration,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_title_length: constants::MAX_TITLE_LENGTH,
            max_authors: constants::MAX_AUTHORS,
            max_genres: constants::MAX_GENRES,
            max_tags: constants::MAX_TAGS,
            max_page_count: constants::MAX_PAGE_COUNT,
            small_batch_threshold: constants::SMALL_BATCH_THRESHOLD,
            max_concurrent_validations: constants::DEFAULT_MAX_CONCURRENT_VALIDATIONS,
            validation_delay: Duration::ZERO,
        }
    }
}

impl From<&LibraryConfig> for ValidatorConfig {
    fn from(config: &LibraryConfig) -> Self {
        Self {
            max_title_length: config.validation.max_title_length,
            max_authors: config.validation.max_authors,
            max_genres: config.validation.max_genres,
            max_tags: config.validation.max_tags,
            max_page_count: config.validation.max_page_count,
            small_batch_threshold: config.validation.small_batch_threshold,
            max_concurrent_validations: config.validation.max_concurrent_validations,
            validation_delay: config.validation_delay(),
        }
    }
}

/// 批量校验工作单元的结局
enum WorkerOutcome {
    Completed,
    Cancelled,
}

/// 图书内容校验器
#[derive(Clone)]
pub struct ContentValidator {
    config: ValidatorConfig,
    patterns: Arc<PatternCache>,
    metrics: Arc<Mutex<ValidationMetrics>>,
}

impl ContentValidator {
    /// 创建新的内容校验器
    pub fn new(config: ValidatorConfig) -> Self {
        Self::with_pattern_cache(config, Arc::new(PatternCache::with_defaults()))
    }

    /// 使用共享的模式缓存创建校验器
    pub fn with_pattern_cache(config: ValidatorConfig, patterns: Arc<PatternCache>) -> Self {
        Self {
            config,
            patterns,
            metrics: Arc::new(Mutex::new(ValidationMetrics::default())),
        }
    }

    /// 获取指标快照
    pub fn metrics(&self) -> ValidationMetrics {
        self.metrics.lock().unwrap().clone()
    }

    /// 显式重置指标
    pub fn cleanup_metrics(&self) {
        self.metrics.lock().unwrap().cleanup();
    }

    /// 校验单本图书
    ///
    /// 首个失败即短路，返回带错误码的结构化错误；结果计入指标。
    pub async fn validate_book(&self, book: &Book) -> Result<(), ValidationError> {
        let start = Instant::now();
        let result = self.run_checks(book).await;
        let elapsed = start.elapsed();

        let mut metrics = self.metrics.lock().unwrap();
        match &result {
            Ok(()) => metrics.record_valid(elapsed),
            Err(error) => metrics.record_invalid(&error.code, elapsed),
        }

        result
    }

    async fn run_checks(&self, book: &Book) -> Result<(), ValidationError> {
        // 1. 必填字段
        if book.title.trim().is_empty() {
            return Err(ValidationError::new(
                "title",
                "TITLE_REQUIRED",
                "书名不能为空",
            ));
        }
        if book.description.trim().is_empty() {
            return Err(ValidationError::new(
                "description",
                "DESCRIPTION_REQUIRED",
                "简介不能为空",
            ));
        }
        if book.language.trim().is_empty() {
            return Err(ValidationError::new(
                "language",
                "LANGUAGE_REQUIRED",
                "语言不能为空",
            ));
        }

        // 2. 格式与取值规则
        let title_length = book.title.chars().count();
        if title_length > self.config.max_title_length {
            return Err(ValidationError::new(
                "title",
                "TITLE_TOO_LONG",
                "书名超出长度限制",
            )
            .with_context("maxLength", self.config.max_title_length as i64)
            .with_context("actualLength", title_length as i64));
        }

        let title_pattern = self.pattern(constants::TITLE_PATTERN).await?;
        if !title_pattern.is_match(&book.title) {
            return Err(ValidationError::new(
                "title",
                "TITLE_INVALID_CHARS",
                "书名包含不允许的字符",
            )
            .with_context("actual", book.title.clone()));
        }

        let language_pattern = self.pattern(constants::LANGUAGE_PATTERN).await?;
        if !language_pattern.is_match(&book.language) {
            return Err(ValidationError::new(
                "language",
                "LANGUAGE_INVALID_FORMAT",
                "语言代码不符合ISO-639-1格式",
            )
            .with_context("actual", book.language.clone()));
        }

        if !book.isbn10.is_empty() {
            let isbn10_pattern = self.pattern(constants::ISBN10_PATTERN).await?;
            if !isbn10_pattern.is_match(&book.isbn10) {
                return Err(ValidationError::new(
                    "isbn10",
                    "ISBN10_INVALID_FORMAT",
                    "ISBN-10格式不正确（9位数字加校验位，校验位允许为X）",
                )
                .with_context("actual", book.isbn10.clone()));
            }
        }

        if !book.isbn13.is_empty() {
            let isbn13_pattern = self.pattern(constants::ISBN13_PATTERN).await?;
            if !isbn13_pattern.is_match(&book.isbn13) {
                return Err(ValidationError::new(
                    "isbn13",
                    "ISBN13_INVALID_FORMAT",
                    "ISBN-13必须是13位数字",
                )
                .with_context("actual", book.isbn13.clone()));
            }
        }

        if book.page_count < 0 || book.page_count > self.config.max_page_count {
            return Err(ValidationError::new(
                "pageCount",
                "PAGE_COUNT_OUT_OF_RANGE",
                "页数超出允许范围",
            )
            .with_context("min", 0)
            .with_context("max", self.config.max_page_count)
            .with_context("actual", book.page_count));
        }

        for format in &book.formats {
            if !KNOWN_FORMATS.contains(&format.as_str()) {
                return Err(ValidationError::new(
                    "formats",
                    "FORMAT_INVALID_VALUE",
                    "图书形态取值无效",
                )
                .with_context(
                    "allowed",
                    serde_json::json!(KNOWN_FORMATS),
                )
                .with_context("actual", format.clone()));
            }
        }

        // 3. 数量规则
        if book.authors.is_empty() {
            return Err(ValidationError::new(
                "authors",
                "AUTHORS_REQUIRED",
                "至少需要一位作者",
            ));
        }
        if book.formats.is_empty() {
            return Err(ValidationError::new(
                "formats",
                "FORMATS_REQUIRED",
                "至少需要一种图书形态",
            ));
        }
        if book.authors.len() > self.config.max_authors {
            return Err(ValidationError::new(
                "authors",
                "AUTHORS_TOO_MANY",
                "作者数量超出上限",
            )
            .with_context("max", self.config.max_authors as i64)
            .with_context("actual", book.authors.len() as i64));
        }
        if book.genres.len() > self.config.max_genres {
            return Err(ValidationError::new(
                "genres",
                "GENRES_TOO_MANY",
                "体裁数量超出上限",
            )
            .with_context("max", self.config.max_genres as i64)
            .with_context("actual", book.genres.len() as i64));
        }
        if book.tags.len() > self.config.max_tags {
            return Err(
                ValidationError::new("tags", "TAGS_TOO_MANY", "标签数量超出上限")
                    .with_context("max", self.config.max_tags as i64)
                    .with_context("actual", book.tags.len() as i64),
            );
        }

        Ok(())
    }

    async fn pattern(&self, source: &str) -> Result<Arc<Regex>, ValidationError> {
        self.patterns.get(source).await.map_err(|error| {
            ValidationError::new("", "VALIDATION_INTERNAL", format!("模式编译失败: {}", error))
        })
    }

    /// 批量校验
    ///
    /// 小批量（低于阈值）顺序执行；大批量交给固定大小的工作池，
    /// 并发数不超过 `max_concurrent_validations`。所有工作单元结束后
    /// 返回序号最小那本失败图书的错误，保证报告内容可复现。
    /// 取消令牌触发后停止接纳新单元，执行中的单元也会尽快返回。
    pub async fn batch_validate(
        &self,
        books: &[Book],
        cancel: &CancelToken,
    ) -> LibraryResult<()> {
        if books.is_empty() {
            return Ok(());
        }

        if books.len() < self.config.small_batch_threshold {
            return self.validate_sequential(books, cancel).await;
        }

        self.validate_concurrent(books, cancel).await
    }

    /// 顺序校验（小批量路径）
    async fn validate_sequential(
        &self,
        books: &[Book],
        cancel: &CancelToken,
    ) -> LibraryResult<()> {
        for book in books {
            if cancel.is_cancelled() {
                return Err(LibraryError::Cancelled);
            }
            self.validate_unit(book).await.map_err(LibraryError::Validation)?;
        }
        Ok(())
    }

    /// 并发校验（工作池路径）
    async fn validate_concurrent(
        &self,
        books: &[Book],
        cancel: &CancelToken,
    ) -> LibraryResult<()> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_validations));
        // 通道容量等于批量规模，生产者永不阻塞
        let (error_tx, mut error_rx) = mpsc::channel::<(usize, ValidationError)>(books.len());

        tracing::debug!(
            "批量校验 {} 本图书，工作池上限 {}",
            books.len(),
            self.config.max_concurrent_validations
        );

        let mut workers = Vec::with_capacity(books.len());
        let mut admitted = 0usize;

        for (index, book) in books.iter().cloned().enumerate() {
            // 取消后停止接纳新单元
            if cancel.is_cancelled() {
                break;
            }

            let semaphore = Arc::clone(&semaphore);
            let validator = self.clone();
            let cancel = cancel.clone();
            let error_tx = error_tx.clone();

            workers.push(tokio::spawn(async move {
                let permit = tokio::select! {
                    _ = cancel.cancelled() => return WorkerOutcome::Cancelled,
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return WorkerOutcome::Cancelled,
                    },
                };

                validator.metrics.lock().unwrap().worker_started();

                let outcome = tokio::select! {
                    _ = cancel.cancelled() => WorkerOutcome::Cancelled,
                    result = validator.validate_unit(&book) => {
                        if let Err(error) = result {
                            let _ = error_tx.try_send((index, error));
                        }
                        WorkerOutcome::Completed
                    }
                };

                validator.metrics.lock().unwrap().worker_finished();
                drop(permit);
                outcome
            }));
            admitted += 1;
        }
        drop(error_tx);

        // 等待所有工作单元结束后再汇总
        let results = join_all(workers).await;

        let mut first_error: Option<(usize, ValidationError)> = None;
        while let Ok((index, error)) = error_rx.try_recv() {
            let replace = first_error
                .as_ref()
                .map_or(true, |(current, _)| index < *current);
            if replace {
                first_error = Some((index, error));
            }
        }

        if let Some((index, error)) = first_error {
            tracing::debug!("批量校验失败，首个失败序号 {}: {}", index, error);
            return Err(LibraryError::Validation(error));
        }

        for result in &results {
            if result.is_err() {
                return Err(LibraryError::Concurrency(
                    "校验工作单元异常退出".to_string(),
                ));
            }
        }

        let any_cancelled = admitted < books.len()
            || results
                .iter()
                .any(|result| matches!(result, Ok(WorkerOutcome::Cancelled)));
        if any_cancelled || cancel.is_cancelled() {
            return Err(LibraryError::Cancelled);
        }

        Ok(())
    }

    async fn validate_unit(&self, book: &Book) -> Result<(), ValidationError> {
        if !self.config.validation_delay.is_zero() {
            tokio::time::sleep(self.config.validation_delay).await;
        }
        self.validate_book(book).await
    }
}

impl Default for ContentValidator {
    fn default() -> Self {
        Self::new(ValidatorConfig::default())
    }
}
