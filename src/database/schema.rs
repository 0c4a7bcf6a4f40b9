use sqlx::{Pool, Sqlite};
use anyhow::Result;

/// 验证数据库schema完整性
pub async fn verify_schema(pool: &Pool<Sqlite>) -> Result<()> {
    // 检查所有必需的表是否存在
    let required_tables = vec!["movies", "movies_fts", "search_history"];

    for table in required_tables {
        let exists = sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name=?")
            .bind(table)
            .fetch_optional(pool)
            .await?;

        if exists.is_none() {
            return Err(anyhow::anyhow!("Required table '{}' does not exist", table));
        }
    }

    // 检查关键索引是否存在
    let required_indexes = vec![
        "idx_movies_title",
        "idx_movies_year",
        "idx_movies_runtime",
        "idx_search_history_searched_at",
    ];

    for index in required_indexes {
        let exists = sqlx::query("SELECT name FROM sqlite_master WHERE type='index' AND name=?")
            .bind(index)
            .fetch_optional(pool)
            .await?;

        if exists.is_none() {
            return Err(anyhow::anyhow!("Required index '{}' does not exist", index));
        }
    }

    // 全文索引依赖触发器同步
    let trigger_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='trigger' AND name LIKE 'movies_fts_%'",
    )
    .fetch_one(pool)
    .await?;

    if trigger_count < 3 {
        tracing::warn!("Full-text index triggers are missing, search results may be stale");
    }

    tracing::info!("Database schema verification completed successfully");
    Ok(())
}

/// 获取数据库统计信息
pub async fn get_database_stats(pool: &Pool<Sqlite>) -> Result<DatabaseStats> {
    let movie_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM movies")
        .fetch_one(pool)
        .await?;

    let search_history_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM search_history")
        .fetch_one(pool)
        .await?;

    // 获取数据库文件大小
    let db_size: i64 = sqlx::query_scalar("SELECT page_count * page_size as size FROM pragma_page_count(), pragma_page_size()")
        .fetch_one(pool)
        .await?;

    Ok(DatabaseStats {
        movie_count,
        search_history_count,
        database_size_bytes: db_size,
    })
}

/// 数据库统计信息
#[derive(Debug)]
pub struct DatabaseStats {
    pub movie_count: i64,
    pub search_history_count: i64,
    pub database_size_bytes: i64,
}

impl DatabaseStats {
    pub fn database_size_mb(&self) -> f64 {
        self.database_size_bytes as f64 / (1024.0 * 1024.0)
    }
}
