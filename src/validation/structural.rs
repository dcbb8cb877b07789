//! 页面数据结构校验器
//!
//! 校验的是集合之间的关系而不是单个字段：每个名称列表项都要有
//! 对应的分组，每个分组引用的图书都要存在于主列表。这里的失败属于
//! 装配缺陷（内部错误类），不是用户输入问题。

use std::collections::{HashMap, HashSet};

use crate::error::{LibraryError, LibraryResult};
use crate::models::{Book, LibraryPageData};

/// 结构校验器
#[derive(Debug, Clone, Default)]
pub struct StructuralValidator;

impl StructuralValidator {
    pub fn new() -> Self {
        Self
    }

    /// 两阶段校验：先补全初始化（幂等、就地修改），再只读检查一致性
    pub fn validate(&self, data: &mut LibraryPageData) -> LibraryResult<()> {
        self.initialize(data);
        self.check_consistency(data)
    }

    /// 初始化阶段
    ///
    /// 集合字段在反序列化边界已经折叠为空值（不存在 null 集合外泄），
    /// 这里重建派生的空字段标记，保证手工构造的数据与取数路径一致。
    /// 重复执行不改变任何内容。
    pub fn initialize(&self, data: &mut LibraryPageData) {
        data.for_each_book_mut(|book| book.compute_empty_fields());
    }

    /// 一致性阶段（只读）
    fn check_consistency(&self, data: &LibraryPageData) -> LibraryResult<()> {
        let known_ids = data.book_ids();

        Self::check_index(
            "byAuthor",
            &data.books_by_authors.all_authors,
            &data.books_by_authors.by_author,
            &known_ids,
        )?;
        Self::check_index(
            "byGenre",
            &data.books_by_genres.all_genres,
            &data.books_by_genres.by_genre,
            &known_ids,
        )?;
        Self::check_index(
            "byTag",
            &data.books_by_tags.all_tags,
            &data.books_by_tags.by_tag,
            &known_ids,
        )?;

        let buckets: [(&str, &[Book]); 3] = [
            ("physical", &data.books_by_format.physical),
            ("eBook", &data.books_by_format.e_book),
            ("audioBook", &data.books_by_format.audio_book),
        ];
        for (bucket, books) in buckets {
            for book in books {
                if !known_ids.contains(&book.id) {
                    return Err(LibraryError::Assembly {
                        category: "byFormat".to_string(),
                        key: bucket.to_string(),
                        detail: format!("引用了主列表中不存在的书目 id={}", book.id),
                    });
                }
            }
        }

        Ok(())
    }

    /// 校验单个分类索引
    ///
    /// 迭代顺序固定（名称列表按原顺序、映射键排序后遍历），
    /// 同样的损坏数据总是报出同一个违规项。
    fn check_index(
        category: &str,
        all_names: &[String],
        by_name: &HashMap<String, Vec<Book>>,
        known_ids: &HashSet<i64>,
    ) -> LibraryResult<()> {
        for name in all_names {
            if !by_name.contains_key(name) {
                return Err(LibraryError::Assembly {
                    category: category.to_string(),
                    key: name.clone(),
                    detail: "名称列表中的键缺少对应的分组".to_string(),
                });
            }
        }

        let mut keys: Vec<&String> = by_name.keys().collect();
        keys.sort();

        let listed: HashSet<&String> = all_names.iter().collect();
        for key in &keys {
            if !listed.contains(key) {
                return Err(LibraryError::Assembly {
                    category: category.to_string(),
                    key: (*key).clone(),
                    detail: "分组键未登记在名称列表中".to_string(),
                });
            }
        }

        for key in keys {
            for book in &by_name[key] {
                if !known_ids.contains(&book.id) {
                    return Err(LibraryError::Assembly {
                        category: category.to_string(),
                        key: key.clone(),
                        detail: format!("引用了主列表中不存在的书目 id={}", book.id),
                    });
                }
            }
        }

        Ok(())
    }
}
