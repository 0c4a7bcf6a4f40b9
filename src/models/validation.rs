use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, Utc};
use serde::Serialize;

/// 标题最大字节数
pub const MAX_TITLE_BYTES: usize = 500;
/// 最早的电影年份
pub const EARLIEST_YEAR: i32 = 1888;
/// 类型数量上限
pub const MAX_GENRES: usize = 5;
/// 单个类型名称长度上限
pub const MAX_GENRE_CHARS: usize = 50;

/// 字段级验证错误集合
///
/// 每个字段只保留第一条错误信息，调用方可以一次性返回所有问题。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    errors: BTreeMap<String, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加错误（同一字段已有错误时忽略）
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.entry(field.into()).or_insert_with(|| message.into());
    }

    /// 条件不成立时添加错误
    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.add(field, message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.errors.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// 没有错误时返回 Ok
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|(field, message)| format!("{}: {}", field, message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// 验证器trait
pub trait Validator {
    type Error;

    fn validate(&self) -> Result<(), Self::Error>;
}

/// 电影字段验证工具
pub struct MovieValidator;

impl MovieValidator {
    pub fn validate_title(errors: &mut ValidationErrors, title: &str) {
        errors.check(!title.trim().is_empty(), "title", "must be provided");
        errors.check(
            title.len() <= MAX_TITLE_BYTES,
            "title",
            "must not be more than 500 bytes long",
        );
    }

    pub fn validate_year(errors: &mut ValidationErrors, year: i32) {
        errors.check(year >= EARLIEST_YEAR, "year", "must be greater than 1888");
        errors.check(
            year <= Utc::now().year() + 1,
            "year",
            "must not be in the future",
        );
    }

    pub fn validate_runtime(errors: &mut ValidationErrors, runtime_minutes: i32) {
        errors.check(runtime_minutes > 0, "runtime_minutes", "must be a positive integer");
    }

    pub fn validate_genres(errors: &mut ValidationErrors, genres: &[String]) {
        errors.check(!genres.is_empty(), "genres", "must contain at least 1 genre");
        errors.check(
            genres.len() <= MAX_GENRES,
            "genres",
            "must not contain more than 5 genres",
        );
        errors.check(
            genres.iter().all(|g| !g.trim().is_empty()),
            "genres",
            "must not contain empty values",
        );
        errors.check(
            genres.iter().all(|g| g.chars().count() <= MAX_GENRE_CHARS),
            "genres",
            "must not contain values longer than 50 characters",
        );
        errors.check(unique_genres(genres), "genres", "must not contain duplicate values");
    }
}

/// 类型去重比较时忽略大小写和首尾空白
pub fn normalize_genre(genre: &str) -> String {
    genre.trim().to_lowercase()
}

fn unique_genres(genres: &[String]) -> bool {
    let mut seen = std::collections::HashSet::with_capacity(genres.len());
    genres.iter().all(|g| seen.insert(normalize_genre(g)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genres(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_first_error_per_field_wins() {
        let mut errors = ValidationErrors::new();
        errors.add("title", "must be provided");
        errors.add("title", "must not be more than 500 bytes long");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get("title"), Some("must be provided"));
    }

    #[test]
    fn test_title_rules() {
        let mut errors = ValidationErrors::new();
        MovieValidator::validate_title(&mut errors, "   ");
        assert_eq!(errors.get("title"), Some("must be provided"));

        let mut errors = ValidationErrors::new();
        MovieValidator::validate_title(&mut errors, &"a".repeat(501));
        assert!(errors.get("title").is_some());

        let mut errors = ValidationErrors::new();
        MovieValidator::validate_title(&mut errors, "Inception");
        assert!(errors.is_empty());
    }

    #[test]
    fn test_year_bounds() {
        let next_year = Utc::now().year() + 1;

        let mut errors = ValidationErrors::new();
        MovieValidator::validate_year(&mut errors, 1887);
        assert!(errors.get("year").is_some());

        let mut errors = ValidationErrors::new();
        MovieValidator::validate_year(&mut errors, next_year + 1);
        assert_eq!(errors.get("year"), Some("must not be in the future"));

        let mut errors = ValidationErrors::new();
        MovieValidator::validate_year(&mut errors, 1888);
        MovieValidator::validate_year(&mut errors, next_year);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_genre_rules() {
        let mut errors = ValidationErrors::new();
        MovieValidator::validate_genres(&mut errors, &[]);
        assert_eq!(errors.get("genres"), Some("must contain at least 1 genre"));

        let mut errors = ValidationErrors::new();
        MovieValidator::validate_genres(&mut errors, &genres(&["Action", "action "]));
        assert_eq!(errors.get("genres"), Some("must not contain duplicate values"));

        let mut errors = ValidationErrors::new();
        MovieValidator::validate_genres(&mut errors, &genres(&["a", "b", "c", "d", "e", "f"]));
        assert!(errors.get("genres").is_some());

        let mut errors = ValidationErrors::new();
        MovieValidator::validate_genres(&mut errors, &genres(&["Action", "Sci-Fi"]));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_display_lists_every_field() {
        let mut errors = ValidationErrors::new();
        errors.add("year", "must be greater than 1888");
        errors.add("title", "must be provided");
        assert_eq!(
            errors.to_string(),
            "title: must be provided; year: must be greater than 1888"
        );
        assert!(errors.clone().into_result().is_err());
    }
}
