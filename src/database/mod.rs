use sqlx::{sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions}, Pool, Sqlite};
use anyhow::Result;
use std::str::FromStr;
use std::time::Duration;

pub mod error;
pub mod schema;
pub mod repository;
pub mod query_builder;

pub use error::{RepositoryError, RepositoryResult};
pub use repository::{MovieRepository, SqliteMovieRepository};
pub use query_builder::MovieQueryBuilder;

use crate::config::DatabaseConfig;

#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
    repository: SqliteMovieRepository,
}

impl Database {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        tracing::info!("Connecting to database: {}", config.url);

        // WAL 模式下读不阻塞写；忙等待超时让并发写入排队而不是立即失败
        let connect_options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(connect_options)
            .await?;

        // Run migrations
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&pool).await?;

        // Verify schema integrity
        schema::verify_schema(&pool).await?;

        let stats = schema::get_database_stats(&pool).await?;
        tracing::info!(
            "Database initialized - Movies: {}, Search history: {}, Size: {:.2} MB",
            stats.movie_count,
            stats.search_history_count,
            stats.database_size_mb()
        );

        let repository = SqliteMovieRepository::new(pool.clone())
            .with_query_timeout(config.query_timeout);

        Ok(Self { pool, repository })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub fn repository(&self) -> &SqliteMovieRepository {
        &self.repository
    }

    /// 获取数据库统计信息
    pub async fn get_stats(&self) -> Result<schema::DatabaseStats> {
        schema::get_database_stats(&self.pool).await
    }

    /// 检查连接是否可用
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// 关闭连接池
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
