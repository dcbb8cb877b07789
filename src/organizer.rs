//! 图书馆数据组织器
//!
//! 把领域数据源返回的扁平图书列表重塑成按作者、体裁、形态、标签
//! 组织的页面视图。输出顺序是确定的：同样的输入永远得到同样的结果。

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::LibraryResult;
use crate::models::{
    LibraryPageData, RawLibraryData, FORMAT_AUDIOBOOK, FORMAT_EBOOK, FORMAT_PHYSICAL,
};

/// 组织过程统计
#[derive(Debug, Clone, Default)]
pub struct OrganizerStats {
    pub input_books: usize,
    pub author_keys: usize,
    pub genre_keys: usize,
    pub tag_keys: usize,
    /// 被丢弃的未知形态条目数
    pub dropped_formats: usize,
    pub processing_time: Duration,
}

impl OrganizerStats {
    pub fn reset(&mut self) {
        *self = Default::default();
    }
}

/// 图书馆数据组织器
#[derive(Debug, Default)]
pub struct LibraryOrganizer {
    stats: Mutex<OrganizerStats>,
}

impl LibraryOrganizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取统计信息快照
    pub fn stats(&self) -> OrganizerStats {
        self.stats.lock().unwrap().clone()
    }

    /// 将扁平结果组织为页面数据
    ///
    /// 一本有 N 位作者的书会出现在 N 个作者键下，体裁与标签同理；
    /// 形态只落入固定的三个分桶，未知形态字符串记一条警告后丢弃，
    /// 绝不会成为新的分桶。派生的空字段标记在此处计算（每次取数一次）。
    pub fn process(&self, raw: RawLibraryData) -> LibraryResult<LibraryPageData> {
        let start = Instant::now();
        let mut dropped_formats = 0usize;

        let mut data = LibraryPageData::new();
        data.books = raw.books;
        for book in data.books.iter_mut() {
            book.compute_empty_fields();
        }

        for book in &data.books {
            for author in &book.authors {
                data.books_by_authors
                    .by_author
                    .entry(author.clone())
                    .or_default()
                    .push(book.clone());
            }
            for genre in &book.genres {
                data.books_by_genres
                    .by_genre
                    .entry(genre.clone())
                    .or_default()
                    .push(book.clone());
            }
            for tag in &book.tags {
                data.books_by_tags
                    .by_tag
                    .entry(tag.clone())
                    .or_default()
                    .push(book.clone());
            }
            for format in &book.formats {
                match format.as_str() {
                    FORMAT_PHYSICAL => data.books_by_format.physical.push(book.clone()),
                    FORMAT_EBOOK => data.books_by_format.e_book.push(book.clone()),
                    FORMAT_AUDIOBOOK => data.books_by_format.audio_book.push(book.clone()),
                    unknown => {
                        dropped_formats += 1;
                        tracing::warn!(
                            "未知的图书形态 \"{}\" 已丢弃 (book id={})",
                            unknown,
                            book.id
                        );
                    }
                }
            }
        }

        // 名称列表只生成一次：作者按姓氏排序，其余按字母序
        let mut all_authors: Vec<String> =
            data.books_by_authors.by_author.keys().cloned().collect();
        sort_by_last_name(&mut all_authors);
        data.books_by_authors.all_authors = all_authors;

        let mut all_genres: Vec<String> = data.books_by_genres.by_genre.keys().cloned().collect();
        all_genres.sort();
        data.books_by_genres.all_genres = all_genres;

        let mut all_tags: Vec<String> = data.books_by_tags.by_tag.keys().cloned().collect();
        all_tags.sort();
        data.books_by_tags.all_tags = all_tags;

        let mut stats = self.stats.lock().unwrap();
        stats.input_books = data.books.len();
        stats.author_keys = data.books_by_authors.all_authors.len();
        stats.genre_keys = data.books_by_genres.all_genres.len();
        stats.tag_keys = data.books_by_tags.all_tags.len();
        stats.dropped_formats = dropped_formats;
        stats.processing_time = start.elapsed();

        tracing::debug!(
            "组织完成: {} 本图书, {} 位作者, {} 个体裁, {} 个标签",
            stats.input_books,
            stats.author_keys,
            stats.genre_keys,
            stats.tag_keys
        );

        Ok(data)
    }
}

/// 按姓氏排序人名
///
/// 以最后一个空白分隔的词作为姓氏键，姓氏相同再按全名比较；
/// 比较统一用小写形式，保证大小写差异不影响顺序。
pub fn sort_by_last_name(names: &mut [String]) {
    names.sort_by(|a, b| {
        let last_a = last_name_key(a);
        let last_b = last_name_key(b);
        last_a
            .cmp(&last_b)
            .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
    });
}

fn last_name_key(name: &str) -> String {
    name.split_whitespace()
        .last()
        .unwrap_or(name)
        .to_lowercase()
}
