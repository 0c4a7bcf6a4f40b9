use crate::models::{MovieFilters, SortField, SortKey};
use sqlx::{QueryBuilder, Sqlite};

const MOVIE_COLUMNS: &str =
    "m.id, m.title, m.year, m.runtime_minutes, m.genres, m.version, m.created_at";

/// 动态查询构建器
///
/// 排序片段只来自 `SortField::column()`，所有用户输入都通过 bind 传入。
pub struct MovieQueryBuilder {
    query: QueryBuilder<'static, Sqlite>,
    has_where: bool,
}

impl MovieQueryBuilder {
    /// 分页查询：返回当前页的行，并用窗口函数附带匹配总数
    pub fn select_page(search_text: Option<&str>) -> Self {
        let match_expr = search_text.and_then(fts_match_expression);
        let rank = if match_expr.is_some() { "fts.score" } else { "0.0" };

        let query = QueryBuilder::new(format!(
            "SELECT {}, {} AS rank, COUNT(*) OVER() AS total_records FROM movies m",
            MOVIE_COLUMNS, rank
        ));
        Self::with_source(query, match_expr)
    }

    /// 计数查询：与分页查询使用相同的条件
    pub fn select_count(search_text: Option<&str>) -> Self {
        let match_expr = search_text.and_then(fts_match_expression);
        let query = QueryBuilder::new("SELECT COUNT(*) FROM movies m");
        Self::with_source(query, match_expr)
    }

    fn with_source(mut query: QueryBuilder<'static, Sqlite>, match_expr: Option<String>) -> Self {
        // 全文检索（排名来自 bm25，数值越小越相关）
        if let Some(expr) = match_expr {
            query.push(
                " JOIN (SELECT movie_id, bm25(movies_fts) AS score FROM movies_fts WHERE movies_fts MATCH ",
            );
            query.push_bind(expr);
            query.push(") fts ON fts.movie_id = m.id");
        }

        Self {
            query,
            has_where: false,
        }
    }

    /// 类型过滤：记录必须包含所有请求的类型
    ///
    /// 比较写入时已规范化的 `genre_keys`，请求的类型也需经过 `normalize_genre`。
    pub fn with_genres(mut self, genres: &[String]) -> Self {
        for genre in genres {
            self.add_where_clause();
            self.query.push(
                "EXISTS (SELECT 1 FROM json_each(m.genre_keys) WHERE json_each.value = ",
            );
            self.query.push_bind(genre.clone());
            self.query.push(")");
        }

        self
    }

    pub fn with_sorting(mut self, sort: SortKey) -> Self {
        self.query.push(" ORDER BY ");
        self.query.push(sort.field.column());
        self.query.push(" ");
        self.query.push(sort.direction.as_sql());

        // id 作为稳定的次级排序键，保证翻页结果确定
        if sort.field != SortField::Id {
            self.query.push(", m.id ASC");
        }

        self
    }

    pub fn with_pagination(mut self, limit: i64, offset: i64) -> Self {
        self.query.push(" LIMIT ");
        self.query.push_bind(limit);
        self.query.push(" OFFSET ");
        self.query.push_bind(offset);
        self
    }

    pub fn sql(&self) -> &str {
        self.query.sql()
    }

    pub fn build(self) -> QueryBuilder<'static, Sqlite> {
        self.query
    }

    fn add_where_clause(&mut self) {
        if !self.has_where {
            self.query.push(" WHERE ");
            self.has_where = true;
        } else {
            self.query.push(" AND ");
        }
    }
}

/// 根据过滤条件构建分页查询
pub fn page_query(filters: &MovieFilters) -> MovieQueryBuilder {
    MovieQueryBuilder::select_page(filters.search_text.as_deref())
        .with_genres(&filters.genres)
        .with_sorting(filters.sort)
        .with_pagination(filters.limit(), filters.offset())
}

/// 根据过滤条件构建计数查询（不分页）
pub fn count_query(filters: &MovieFilters) -> MovieQueryBuilder {
    MovieQueryBuilder::select_count(filters.search_text.as_deref()).with_genres(&filters.genres)
}

/// 把自由文本转换为 FTS5 表达式
///
/// 只保留字母数字词元，逐个加引号并加前缀通配，例如 "fri" 可以匹配 "friends"。
/// 没有可检索词元时返回 None，此时不做全文过滤。
pub fn fts_match_expression(text: &str) -> Option<String> {
    let terms: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"*", t.to_lowercase()))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SortDirection;

    #[test]
    fn test_fts_expression() {
        assert_eq!(fts_match_expression("Incep"), Some("\"incep\"*".to_string()));
        assert_eq!(
            fts_match_expression("lord of the \"rings\""),
            Some("\"lord\"* \"of\"* \"the\"* \"rings\"*".to_string())
        );
        assert_eq!(fts_match_expression("  -- ; ' "), None);
        assert_eq!(fts_match_expression(""), None);
    }

    #[test]
    fn test_plain_page_query() {
        let builder = page_query(&MovieFilters::default());
        let sql = builder.sql();
        assert!(sql.contains("0.0 AS rank"));
        assert!(sql.contains("COUNT(*) OVER() AS total_records"));
        assert!(!sql.contains("movies_fts"));
        assert!(!sql.contains("WHERE"));
        assert!(sql.ends_with("ORDER BY m.id ASC LIMIT ? OFFSET ?"));
    }

    #[test]
    fn test_search_and_genres() {
        let filters = MovieFilters {
            search_text: Some("inception".to_string()),
            genres: vec!["action".to_string(), "sci-fi".to_string()],
            sort: SortKey::descending(SortField::Year),
            ..Default::default()
        };
        let builder = page_query(&filters);
        let sql = builder.sql();
        assert!(sql.contains("fts.score AS rank"));
        assert!(sql.contains("movies_fts MATCH ?"));
        assert_eq!(sql.matches("json_each").count(), 2);
        assert!(sql.contains(" WHERE EXISTS"));
        assert!(sql.contains(") AND EXISTS"));
        assert!(sql.contains("ORDER BY m.year DESC, m.id ASC"));
    }

    #[test]
    fn test_unsearchable_text_skips_fts() {
        let filters = MovieFilters {
            search_text: Some("!!!".to_string()),
            ..Default::default()
        };
        assert!(!page_query(&filters).sql().contains("movies_fts"));
    }

    #[test]
    fn test_every_sort_field_maps_to_fixed_fragment() {
        for field in SortField::ALL {
            for direction in [SortDirection::Ascending, SortDirection::Descending] {
                let sort = SortKey { field, direction };
                let builder = MovieQueryBuilder::select_page(None).with_sorting(sort);
                let expected = format!("ORDER BY {} {}", field.column(), direction.as_sql());
                assert!(builder.sql().contains(&expected));
            }
        }
    }

    #[test]
    fn test_count_query_has_no_window() {
        let filters = MovieFilters {
            genres: vec!["drama".to_string()],
            ..Default::default()
        };
        let builder = count_query(&filters);
        assert!(builder.sql().starts_with("SELECT COUNT(*) FROM movies m WHERE EXISTS"));
        assert!(!builder.sql().contains("LIMIT"));
    }
}
