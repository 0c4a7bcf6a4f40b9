use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::validation::{normalize_genre, ValidationErrors, MAX_GENRES};

/// 页码上限
pub const MAX_PAGE: i64 = 10_000_000;

/// 可排序字段
///
/// 每个字段对应一段固定的 ORDER BY 片段，调用方的字符串只用于查表。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Id,
    Title,
    Year,
    Runtime,
    /// 全文检索相关度，升序时最相关的在前
    Relevance,
}

impl SortField {
    pub const ALL: [SortField; 5] = [
        SortField::Id,
        SortField::Title,
        SortField::Year,
        SortField::Runtime,
        SortField::Relevance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Id => "id",
            SortField::Title => "title",
            SortField::Year => "year",
            SortField::Runtime => "runtime",
            SortField::Relevance => "relevance",
        }
    }

    /// SQL 排序列
    pub fn column(&self) -> &'static str {
        match self {
            SortField::Id => "m.id",
            SortField::Title => "m.title",
            SortField::Year => "m.year",
            SortField::Runtime => "m.runtime_minutes",
            SortField::Relevance => "rank",
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => Ok(SortField::Id),
            "title" => Ok(SortField::Title),
            "year" => Ok(SortField::Year),
            "runtime" => Ok(SortField::Runtime),
            "relevance" => Ok(SortField::Relevance),
            _ => Err(format!("Invalid sort field: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

/// 排序键，文本形式为 "year" 或 "-year"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn ascending(field: SortField) -> Self {
        Self { field, direction: SortDirection::Ascending }
    }

    pub fn descending(field: SortField) -> Self {
        Self { field, direction: SortDirection::Descending }
    }

    /// 拆分前缀 "-" 并在白名单中查找字段
    pub fn parse(raw: &str, safelist: &[SortField]) -> Option<Self> {
        let (name, direction) = match raw.strip_prefix('-') {
            Some(rest) => (rest, SortDirection::Descending),
            None => (raw, SortDirection::Ascending),
        };
        let field = name.parse::<SortField>().ok()?;
        safelist
            .contains(&field)
            .then_some(Self { field, direction })
    }
}

impl Default for SortKey {
    fn default() -> Self {
        Self::ascending(SortField::Id)
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            SortDirection::Ascending => write!(f, "{}", self.field),
            SortDirection::Descending => write!(f, "-{}", self.field),
        }
    }
}

/// 列表查询的原始参数，数值尚未解析
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListMoviesParams {
    pub title: Option<String>,
    pub genres: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub sort: Option<String>,
}

/// 已验证的过滤条件
#[derive(Debug, Clone, PartialEq)]
pub struct MovieFilters {
    pub search_text: Option<String>,
    /// 已规范化（小写、去重）
    pub genres: Vec<String>,
    pub page: i64,
    pub page_size: i64,
    pub sort: SortKey,
}

impl MovieFilters {
    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

impl Default for MovieFilters {
    fn default() -> Self {
        Self {
            search_text: None,
            genres: Vec::new(),
            page: 1,
            page_size: 20,
            sort: SortKey::default(),
        }
    }
}

/// 分页元数据，每次查询计算，不落库
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub current_page: i64,
    pub page_size: i64,
    pub first_page: i64,
    pub last_page: i64,
    pub total_records: i64,
}

impl Metadata {
    /// 没有匹配记录时返回全零元数据
    pub fn calculate(total_records: i64, page: i64, page_size: i64) -> Self {
        if total_records <= 0 || page_size <= 0 {
            return Self::default();
        }

        Self {
            current_page: page,
            page_size,
            first_page: 1,
            last_page: (total_records + page_size - 1) / page_size,
            total_records,
        }
    }
}

/// 过滤参数验证器
///
/// 排序白名单和分页上限来自配置。
#[derive(Debug, Clone)]
pub struct FilterValidator {
    safelist: Vec<SortField>,
    max_page_size: i64,
    default_page_size: i64,
}

impl FilterValidator {
    pub fn new(safelist: Vec<SortField>, max_page_size: i64, default_page_size: i64) -> Self {
        Self {
            safelist,
            max_page_size,
            default_page_size,
        }
    }

    /// 未指定排序时使用的键：白名单包含 id 时按 id，否则按白名单第一个字段
    pub fn default_sort(&self) -> Option<SortKey> {
        if self.safelist.contains(&SortField::Id) {
            Some(SortKey::default())
        } else {
            self.safelist.first().copied().map(SortKey::ascending)
        }
    }

    /// 验证并规范化参数，所有字段的错误一起返回
    pub fn validate(&self, params: &ListMoviesParams) -> Result<MovieFilters, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let page = read_int(&mut errors, "page", params.page.as_deref(), 1);
        if let Some(page) = page {
            errors.check(page > 0, "page", "must be greater than zero");
            errors.check(page <= MAX_PAGE, "page", "must be a maximum of 10 million");
        }

        let page_size = read_int(
            &mut errors,
            "page_size",
            params.page_size.as_deref(),
            self.default_page_size,
        );
        if let Some(page_size) = page_size {
            errors.check(page_size > 0, "page_size", "must be greater than zero");
            if page_size > self.max_page_size {
                errors.add(
                    "page_size",
                    format!("must be a maximum of {}", self.max_page_size),
                );
            }
        }

        let sort = match params.sort.as_deref().map(str::trim) {
            None | Some("") => self.default_sort(),
            Some(raw) => SortKey::parse(raw, &self.safelist),
        };
        if sort.is_none() {
            errors.add("sort", "invalid sort value");
        }

        let genres = read_genres(params.genres.as_deref());
        errors.check(
            genres.len() <= MAX_GENRES,
            "genres",
            "must not contain more than 5 genres",
        );

        let search_text = params
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        errors.into_result()?;

        // 无错误时各项均已解析成功
        match (page, page_size, sort) {
            (Some(page), Some(page_size), Some(sort)) => Ok(MovieFilters {
                search_text,
                genres,
                page,
                page_size,
                sort,
            }),
            _ => {
                let mut errors = ValidationErrors::new();
                errors.add("filters", "could not be parsed");
                Err(errors)
            }
        }
    }
}

impl Default for FilterValidator {
    fn default() -> Self {
        Self::new(SortField::ALL.to_vec(), 100, 20)
    }
}

fn read_int(
    errors: &mut ValidationErrors,
    field: &str,
    raw: Option<&str>,
    default: i64,
) -> Option<i64> {
    match raw.map(str::trim) {
        None | Some("") => Some(default),
        Some(value) => match value.parse::<i64>() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                errors.add(field, "must be an integer value");
                None
            }
        },
    }
}

/// 逗号分隔的类型列表，保持首次出现的顺序
fn read_genres(raw: Option<&str>) -> Vec<String> {
    let mut genres: Vec<String> = Vec::new();
    for genre in raw.unwrap_or_default().split(',').map(normalize_genre) {
        if !genre.is_empty() && !genres.contains(&genre) {
            genres.push(genre);
        }
    }
    genres
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn params(page: Option<&str>, page_size: Option<&str>, sort: Option<&str>) -> ListMoviesParams {
        ListMoviesParams {
            page: page.map(str::to_string),
            page_size: page_size.map(str::to_string),
            sort: sort.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_when_absent() {
        let filters = FilterValidator::default()
            .validate(&ListMoviesParams::default())
            .unwrap();
        assert_eq!(filters.page, 1);
        assert_eq!(filters.page_size, 20);
        assert_eq!(filters.sort, SortKey::ascending(SortField::Id));
        assert!(filters.search_text.is_none());
        assert!(filters.genres.is_empty());
    }

    #[test]
    fn test_descending_prefix() {
        let filters = FilterValidator::default()
            .validate(&params(None, None, Some("-year")))
            .unwrap();
        assert_eq!(filters.sort, SortKey::descending(SortField::Year));
        assert_eq!(filters.sort.to_string(), "-year");
    }

    #[test]
    fn test_collects_errors_for_every_field() {
        let errors = FilterValidator::default()
            .validate(&params(Some("0"), Some("101"), Some("title; DROP TABLE movies")))
            .unwrap_err();
        assert_eq!(errors.get("page"), Some("must be greater than zero"));
        assert_eq!(errors.get("page_size"), Some("must be a maximum of 100"));
        assert_eq!(errors.get("sort"), Some("invalid sort value"));
    }

    #[test]
    fn test_non_integer_page() {
        let errors = FilterValidator::default()
            .validate(&params(Some("abc"), None, None))
            .unwrap_err();
        assert_eq!(errors.get("page"), Some("must be an integer value"));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_known_field_outside_safelist_is_rejected() {
        let validator = FilterValidator::new(vec![SortField::Id, SortField::Title], 100, 20);
        assert!(validator.validate(&params(None, None, Some("-title"))).is_ok());
        let errors = validator.validate(&params(None, None, Some("year"))).unwrap_err();
        assert_eq!(errors.get("sort"), Some("invalid sort value"));
    }

    #[test]
    fn test_default_sort_stays_inside_safelist() {
        let validator = FilterValidator::new(vec![SortField::Year, SortField::Title], 100, 20);
        let filters = validator.validate(&ListMoviesParams::default()).unwrap();
        assert_eq!(filters.sort, SortKey::ascending(SortField::Year));

        let validator = FilterValidator::new(Vec::new(), 100, 20);
        let errors = validator.validate(&ListMoviesParams::default()).unwrap_err();
        assert_eq!(errors.get("sort"), Some("invalid sort value"));
    }

    #[test]
    fn test_offset_saturates() {
        let filters = MovieFilters {
            page: MAX_PAGE,
            page_size: i64::MAX,
            ..Default::default()
        };
        assert_eq!(filters.offset(), i64::MAX);
    }

    #[test]
    fn test_page_upper_bound() {
        let errors = FilterValidator::default()
            .validate(&params(Some("10000001"), None, None))
            .unwrap_err();
        assert_eq!(errors.get("page"), Some("must be a maximum of 10 million"));
    }

    #[test]
    fn test_genres_are_normalized() {
        let filters = FilterValidator::default()
            .validate(&ListMoviesParams {
                genres: Some(" Action,sci-fi,,ACTION ".to_string()),
                title: Some("  ".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(filters.genres, vec!["action", "sci-fi"]);
        assert!(filters.search_text.is_none());
    }

    #[test]
    fn test_offset() {
        let filters = MovieFilters {
            page: 3,
            page_size: 10,
            ..Default::default()
        };
        assert_eq!(filters.offset(), 20);
        assert_eq!(filters.limit(), 10);
    }

    #[test]
    fn test_metadata() {
        assert_eq!(Metadata::calculate(0, 1, 20), Metadata::default());

        let metadata = Metadata::calculate(25, 3, 10);
        assert_eq!(metadata.first_page, 1);
        assert_eq!(metadata.last_page, 3);
        assert_eq!(metadata.current_page, 3);
        assert_eq!(metadata.total_records, 25);

        assert_eq!(Metadata::calculate(20, 1, 10).last_page, 2);
    }

    proptest! {
        #[test]
        fn prop_unknown_sort_never_accepted(raw in "[a-z_;' -]{1,24}") {
            let trimmed = raw.trim();
            let bare = trimmed.strip_prefix('-').unwrap_or(trimmed);
            let expected_ok = trimmed.is_empty() || bare.parse::<SortField>().is_ok();

            match FilterValidator::default().validate(&params(None, None, Some(&raw))) {
                Ok(filters) => {
                    prop_assert!(expected_ok);
                    prop_assert!(SortField::ALL.contains(&filters.sort.field));
                }
                Err(errors) => {
                    prop_assert!(!expected_ok);
                    prop_assert_eq!(errors.get("sort"), Some("invalid sort value"));
                }
            }
        }

        #[test]
        fn prop_page_size_bounds(page_size in -1000i64..1000) {
            let result = FilterValidator::default()
                .validate(&params(None, Some(&page_size.to_string()), None));
            prop_assert_eq!(result.is_ok(), (1..=100).contains(&page_size));
        }
    }
}
