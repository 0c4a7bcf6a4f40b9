use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Pool, Sqlite};

use super::error::{RepositoryError, RepositoryResult};
use super::query_builder;
use crate::models::{Metadata, Movie, MovieFilters, MovieRow};

/// 默认单条查询超时
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(3);

/// 电影仓库接口
///
/// 每个操作在存储层各自原子；跨操作的一致性由 version 字段保证，不加锁。
#[async_trait]
pub trait MovieRepository: Send + Sync {
    /// 分配 id、version=1、created_at，并写入
    async fn insert(&self, movie: &mut Movie) -> RepositoryResult<()>;
    async fn get(&self, id: &str) -> RepositoryResult<Movie>;
    /// 仅当存储中的 version 仍等于 `movie.version` 时写入，成功后 version 加一
    async fn update(&self, movie: &mut Movie) -> RepositoryResult<()>;
    async fn delete(&self, id: &str) -> RepositoryResult<()>;
    async fn get_all(&self, filters: &MovieFilters) -> RepositoryResult<(Vec<Movie>, Metadata)>;

    // 搜索历史
    async fn record_search(&self, query: &str, result_count: i64) -> RepositoryResult<()>;
    async fn prune_search_history(&self, older_than: DateTime<Utc>) -> RepositoryResult<u64>;
}

/// 分页查询的结果行
#[derive(Debug, FromRow)]
struct MovieListRow {
    #[sqlx(flatten)]
    movie: MovieRow,
    total_records: i64,
}

/// SQLite 电影仓库实现
#[derive(Clone)]
pub struct SqliteMovieRepository {
    pool: Pool<Sqlite>,
    query_timeout: Duration,
}

impl SqliteMovieRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self {
            pool,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// 给存储调用加上超时
    async fn timed<T, F>(&self, fut: F) -> RepositoryResult<T>
    where
        F: Future<Output = RepositoryResult<T>> + Send,
    {
        tokio::time::timeout(self.query_timeout, fut)
            .await
            .map_err(|_| RepositoryError::Timeout(self.query_timeout))?
    }

    async fn fetch_page(&self, filters: &MovieFilters) -> RepositoryResult<(Vec<Movie>, i64)> {
        // 页查询和补充计数在同一个读事务中执行，读取同一快照
        let mut tx = self.pool.begin().await?;

        let rows: Vec<MovieListRow> = query_builder::page_query(filters)
            .build()
            .build_query_as::<MovieListRow>()
            .fetch_all(&mut *tx)
            .await?;

        let total_records = match rows.first() {
            Some(row) => row.total_records,
            // 页码超出范围时窗口函数没有行可用，单独计数
            None if filters.offset() > 0 => {
                query_builder::count_query(filters)
                    .build()
                    .build_query_scalar::<i64>()
                    .fetch_one(&mut *tx)
                    .await?
            }
            None => 0,
        };

        tx.commit().await?;

        let movies = rows
            .into_iter()
            .map(|row| Movie::try_from(row.movie))
            .collect::<Result<Vec<_>, _>>()?;

        Ok((movies, total_records))
    }
}

#[async_trait]
impl MovieRepository for SqliteMovieRepository {
    async fn insert(&self, movie: &mut Movie) -> RepositoryResult<()> {
        movie.id = uuid::Uuid::new_v4().to_string();
        movie.version = 1;
        movie.created_at = Utc::now();

        let genres = movie.genres_json();
        let genre_keys = movie.genre_keys_json();
        self.timed(async {
            sqlx::query(
                r#"
                INSERT INTO movies (id, title, year, runtime_minutes, genres, genre_keys, version, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&movie.id)
            .bind(&movie.title)
            .bind(movie.year)
            .bind(movie.runtime_minutes)
            .bind(&genres)
            .bind(&genre_keys)
            .bind(movie.version)
            .bind(movie.created_at)
            .execute(&self.pool)
            .await?;
            Ok::<_, RepositoryError>(())
        })
        .await?;

        tracing::debug!(movie_id = %movie.id, "Inserted movie");
        Ok(())
    }

    async fn get(&self, id: &str) -> RepositoryResult<Movie> {
        // 非法 UUID 不可能存在于表中
        if uuid::Uuid::parse_str(id).is_err() {
            return Err(RepositoryError::NotFound);
        }

        let row = self
            .timed(async {
                let row = sqlx::query_as::<_, MovieRow>(
                    "SELECT id, title, year, runtime_minutes, genres, version, created_at FROM movies WHERE id = ?",
                )
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
                Ok::<_, RepositoryError>(row)
            })
            .await?
            .ok_or(RepositoryError::NotFound)?;

        Ok(Movie::try_from(row)?)
    }

    async fn update(&self, movie: &mut Movie) -> RepositoryResult<()> {
        let genres = movie.genres_json();
        let genre_keys = movie.genre_keys_json();

        // 版本检查与自增在同一条语句中完成
        let new_version = self
            .timed(async {
                let version = sqlx::query_scalar::<_, i32>(
                    r#"
                    UPDATE movies
                    SET title = ?, year = ?, runtime_minutes = ?, genres = ?, genre_keys = ?, version = version + 1
                    WHERE id = ? AND version = ?
                    RETURNING version
                    "#,
                )
                .bind(&movie.title)
                .bind(movie.year)
                .bind(movie.runtime_minutes)
                .bind(&genres)
                .bind(&genre_keys)
                .bind(&movie.id)
                .bind(movie.version)
                .fetch_optional(&self.pool)
                .await?;
                Ok::<_, RepositoryError>(version)
            })
            .await?;

        match new_version {
            Some(version) => {
                tracing::debug!(movie_id = %movie.id, version, "Updated movie");
                movie.version = version;
                Ok(())
            }
            None => {
                tracing::info!(
                    movie_id = %movie.id,
                    expected_version = movie.version,
                    "Update rejected by version check"
                );
                Err(RepositoryError::EditConflict)
            }
        }
    }

    async fn delete(&self, id: &str) -> RepositoryResult<()> {
        if uuid::Uuid::parse_str(id).is_err() {
            return Err(RepositoryError::NotFound);
        }

        let rows_affected = self
            .timed(async {
                let result = sqlx::query("DELETE FROM movies WHERE id = ?")
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
                Ok::<_, RepositoryError>(result.rows_affected())
            })
            .await?;

        if rows_affected == 0 {
            return Err(RepositoryError::NotFound);
        }

        tracing::debug!(movie_id = %id, "Deleted movie");
        Ok(())
    }

    async fn get_all(&self, filters: &MovieFilters) -> RepositoryResult<(Vec<Movie>, Metadata)> {
        let (movies, total_records) = self.timed(self.fetch_page(filters)).await?;
        let metadata = Metadata::calculate(total_records, filters.page, filters.page_size);
        Ok((movies, metadata))
    }

    async fn record_search(&self, query: &str, result_count: i64) -> RepositoryResult<()> {
        self.timed(async {
            sqlx::query(
                "INSERT INTO search_history (id, query, result_count, searched_at) VALUES (?, ?, ?, ?)",
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(query)
            .bind(result_count)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
            Ok::<_, RepositoryError>(())
        })
        .await
    }

    async fn prune_search_history(&self, older_than: DateTime<Utc>) -> RepositoryResult<u64> {
        self.timed(async {
            let result = sqlx::query("DELETE FROM search_history WHERE searched_at < ?")
                .bind(older_than)
                .execute(&self.pool)
                .await?;
            Ok::<_, RepositoryError>(result.rows_affected())
        })
        .await
    }
}
