use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::validation::{normalize_genre, MovieValidator, ValidationErrors, Validator};

/// 电影记录
///
/// `id`、`version`、`created_at` 由仓库在插入时分配，调用方构造时的值会被覆盖。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: String,
    pub title: String,
    pub year: i32,
    pub runtime_minutes: i32,
    pub genres: Vec<String>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
}

/// 数据库中的电影行，genres 以 JSON 字符串保存
#[derive(Debug, Clone, FromRow)]
pub struct MovieRow {
    pub id: String,
    pub title: String,
    pub year: i32,
    pub runtime_minutes: i32,
    pub genres: String, // JSON array as string
    pub version: i32,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<MovieRow> for Movie {
    type Error = serde_json::Error;

    fn try_from(row: MovieRow) -> Result<Self, Self::Error> {
        Ok(Self {
            genres: serde_json::from_str(&row.genres)?,
            id: row.id,
            title: row.title,
            year: row.year,
            runtime_minutes: row.runtime_minutes,
            version: row.version,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateMovieRequest {
    pub title: String,
    pub year: i32,
    pub runtime_minutes: i32,
    #[serde(default)]
    pub genres: Vec<String>,
}

/// 部分更新请求，未提供的字段保持不变
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateMovieRequest {
    pub title: Option<String>,
    pub year: Option<i32>,
    pub runtime_minutes: Option<i32>,
    pub genres: Option<Vec<String>>,
}

impl Movie {
    /// 创建尚未持久化的电影（version 为 0，插入时分配）
    pub fn new(title: impl Into<String>, year: i32, runtime_minutes: i32, genres: Vec<String>) -> Self {
        Self {
            id: String::new(),
            title: title.into(),
            year,
            runtime_minutes,
            genres,
            version: 0,
            created_at: Utc::now(),
        }
    }

    /// 从创建请求构建并验证
    pub fn from_create_request(request: CreateMovieRequest) -> Result<Self, ValidationErrors> {
        let movie = Self::new(
            request.title.trim(),
            request.year,
            request.runtime_minutes,
            request.genres.into_iter().map(|g| g.trim().to_string()).collect(),
        );
        movie.validate()?;
        Ok(movie)
    }

    /// 应用部分更新并重新验证整条记录
    pub fn apply_update(&mut self, request: UpdateMovieRequest) -> Result<(), ValidationErrors> {
        if let Some(title) = request.title {
            self.title = title.trim().to_string();
        }

        if let Some(year) = request.year {
            self.year = year;
        }

        if let Some(runtime_minutes) = request.runtime_minutes {
            self.runtime_minutes = runtime_minutes;
        }

        if let Some(genres) = request.genres {
            self.genres = genres.into_iter().map(|g| g.trim().to_string()).collect();
        }

        self.validate()
    }

    /// 序列化 genres 以写入数据库
    pub fn genres_json(&self) -> String {
        // Vec<String> 序列化不会失败
        serde_json::to_string(&self.genres).unwrap_or_else(|_| "[]".to_string())
    }

    /// 序列化规范化后的类型，与过滤参数使用同一规则
    pub fn genre_keys_json(&self) -> String {
        let keys: Vec<String> = self.genres.iter().map(|g| normalize_genre(g)).collect();
        serde_json::to_string(&keys).unwrap_or_else(|_| "[]".to_string())
    }
}

impl Validator for Movie {
    type Error = ValidationErrors;

    fn validate(&self) -> Result<(), Self::Error> {
        let mut errors = ValidationErrors::new();
        MovieValidator::validate_title(&mut errors, &self.title);
        MovieValidator::validate_year(&mut errors, self.year);
        MovieValidator::validate_runtime(&mut errors, self.runtime_minutes);
        MovieValidator::validate_genres(&mut errors, &self.genres);
        errors.into_result()
    }
}
