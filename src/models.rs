//! 图书馆核心数据模型
//!
//! 定义图书实体、按分类组织的页面数据和响应信封。
//! 所有对外（前端契约）结构统一使用 camelCase 字段名序列化。

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Deserializer, Serialize};

/// 查询参数集合
///
/// 使用有序映射，保证缓存键派生是确定性的。
pub type QueryParams = BTreeMap<String, String>;

/// 已知的三种图书形态
pub const FORMAT_PHYSICAL: &str = "physical";
pub const FORMAT_EBOOK: &str = "eBook";
pub const FORMAT_AUDIOBOOK: &str = "audioBook";

/// 固定的形态枚举，未知形态不会成为新的分桶
pub const KNOWN_FORMATS: &[&str] = &[FORMAT_PHYSICAL, FORMAT_EBOOK, FORMAT_AUDIOBOOK];

/// 将 JSON null 反序列化为默认值
///
/// 存储层返回的行中集合字段可能是 null；统一在反序列化边界折叠为空值，
/// 下游代码不再需要处理"缺失集合"。
fn null_to_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// 图书实体（存储层所有，此处只读引用）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Book {
    pub id: i64,
    #[serde(deserialize_with = "null_to_default")]
    pub title: String,
    /// 富文本简介，空串表示缺失
    #[serde(deserialize_with = "null_to_default")]
    pub description: String,
    #[serde(deserialize_with = "null_to_default")]
    pub language: String,
    pub page_count: i64,
    #[serde(deserialize_with = "null_to_default")]
    pub publish_date: String,
    #[serde(deserialize_with = "null_to_default")]
    pub isbn10: String,
    #[serde(deserialize_with = "null_to_default")]
    pub isbn13: String,
    #[serde(deserialize_with = "null_to_default")]
    pub image_link: String,
    #[serde(deserialize_with = "null_to_default")]
    pub authors: Vec<String>,
    #[serde(deserialize_with = "null_to_default")]
    pub genres: Vec<String>,
    #[serde(deserialize_with = "null_to_default")]
    pub tags: Vec<String>,
    #[serde(deserialize_with = "null_to_default")]
    pub formats: Vec<String>,
    pub is_in_library: bool,
    /// 派生字段：每次取数时计算一次
    pub has_empty_fields: bool,
    #[serde(deserialize_with = "null_to_default")]
    pub empty_fields: Vec<String>,
}

impl Book {
    /// 重新计算空字段标记
    ///
    /// 检查顺序固定，保证 `empty_fields` 内容可复现。幂等。
    pub fn compute_empty_fields(&mut self) {
        let mut empty = Vec::new();

        if self.description.trim().is_empty() {
            empty.push("description".to_string());
        }
        if self.publish_date.trim().is_empty() {
            empty.push("publishDate".to_string());
        }
        if self.image_link.trim().is_empty() {
            empty.push("imageLink".to_string());
        }
        if self.isbn10.trim().is_empty() {
            empty.push("isbn10".to_string());
        }
        if self.isbn13.trim().is_empty() {
            empty.push("isbn13".to_string());
        }
        if self.genres.is_empty() {
            empty.push("genres".to_string());
        }
        if self.tags.is_empty() {
            empty.push("tags".to_string());
        }

        self.has_empty_fields = !empty.is_empty();
        self.empty_fields = empty;
    }
}

/// 按作者组织的视图
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BooksByAuthors {
    #[serde(deserialize_with = "null_to_default")]
    pub all_authors: Vec<String>,
    #[serde(deserialize_with = "null_to_default")]
    pub by_author: HashMap<String, Vec<Book>>,
}

/// 按体裁组织的视图
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BooksByGenres {
    #[serde(deserialize_with = "null_to_default")]
    pub all_genres: Vec<String>,
    #[serde(deserialize_with = "null_to_default")]
    pub by_genre: HashMap<String, Vec<Book>>,
}

/// 按形态组织的视图，固定三个分桶
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BooksByFormat {
    #[serde(deserialize_with = "null_to_default")]
    pub physical: Vec<Book>,
    #[serde(deserialize_with = "null_to_default")]
    pub e_book: Vec<Book>,
    #[serde(deserialize_with = "null_to_default")]
    pub audio_book: Vec<Book>,
}

/// 按标签组织的视图
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BooksByTags {
    #[serde(deserialize_with = "null_to_default")]
    pub all_tags: Vec<String>,
    #[serde(deserialize_with = "null_to_default")]
    pub by_tag: HashMap<String, Vec<Book>>,
}

/// 单个用户的图书馆页面数据
///
/// 每次编排调用开始时以空结构构建（所有集合均已初始化），由组织器填充、
/// 校验后按需缓存（序列化存储），响应返回后即丢弃，不是长生命周期实体。
///
/// 不变量：`all_*` 列表中的每个名称必须是对应 `by_*` 映射的键；
/// 任何分类视图中引用的图书必须按 id 出现在 `books` 主列表中。
/// 该不变量在构建后、反序列化后以及任何变更后都必须成立。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LibraryPageData {
    #[serde(deserialize_with = "null_to_default")]
    pub books: Vec<Book>,
    pub books_by_authors: BooksByAuthors,
    pub books_by_genres: BooksByGenres,
    pub books_by_format: BooksByFormat,
    pub books_by_tags: BooksByTags,
}

impl LibraryPageData {
    /// 构建空的但结构完整的页面数据
    pub fn new() -> Self {
        Self::default()
    }

    /// 主列表中全部图书 id 的集合
    pub fn book_ids(&self) -> HashSet<i64> {
        self.books.iter().map(|book| book.id).collect()
    }

    /// 对信封中出现的每一本图书执行变换（含各分类视图内的副本）
    pub fn for_each_book_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut Book),
    {
        for book in self.books.iter_mut() {
            f(book);
        }
        for books in self.books_by_authors.by_author.values_mut() {
            for book in books.iter_mut() {
                f(book);
            }
        }
        for books in self.books_by_genres.by_genre.values_mut() {
            for book in books.iter_mut() {
                f(book);
            }
        }
        for books in self.books_by_tags.by_tag.values_mut() {
            for book in books.iter_mut() {
                f(book);
            }
        }
        for book in self.books_by_format.physical.iter_mut() {
            f(book);
        }
        for book in self.books_by_format.e_book.iter_mut() {
            f(book);
        }
        for book in self.books_by_format.audio_book.iter_mut() {
            f(book);
        }
    }
}

/// 数据来源标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Cache,
    Database,
}

/// 响应信封（前端契约）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryResponse {
    pub request_id: String,
    pub data: LibraryPageData,
    pub source: DataSource,
}

/// 领域数据源返回的原始结果（对核心不透明）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawLibraryData {
    pub user_id: i64,
    #[serde(deserialize_with = "null_to_default")]
    pub books: Vec<Book>,
}
