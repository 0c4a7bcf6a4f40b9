use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::database::MovieRepository;
use crate::lifecycle::BackgroundTasks;

/// 清理间隔
pub const DEFAULT_PRUNE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// 在后台记录一次搜索，不阻塞当前请求
///
/// 任务登记在 `tasks` 中，关闭时会等待它写完。
pub fn record_in_background(
    tasks: &BackgroundTasks,
    repository: Arc<dyn MovieRepository>,
    query: String,
    result_count: i64,
) {
    tasks.spawn("record_search", async move {
        if let Err(e) = repository.record_search(&query, result_count).await {
            tracing::warn!(error = %e, "Failed to record search history");
        }
    });
}

/// 搜索历史定期清理任务
pub struct SearchHistoryRetention {
    repository: Arc<dyn MovieRepository>,
    retention: chrono::Duration,
    interval: Duration,
}

impl SearchHistoryRetention {
    pub fn new(repository: Arc<dyn MovieRepository>, retention: chrono::Duration) -> Self {
        Self {
            repository,
            retention,
            interval: DEFAULT_PRUNE_INTERVAL,
        }
    }

    /// 删除超过保留期的记录，返回删除条数
    pub async fn prune_once(&self) -> u64 {
        let cutoff = Utc::now() - self.retention;
        match self.repository.prune_search_history(cutoff).await {
            Ok(deleted) => {
                if deleted > 0 {
                    tracing::info!(deleted, "Search history retention: purged old entries");
                } else {
                    tracing::debug!("Search history retention: nothing to purge");
                }
                deleted
            }
            Err(e) => {
                tracing::error!(error = %e, "Search history retention: cleanup failed");
                0
            }
        }
    }

    /// 循环清理直到 `cancel` 被触发
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            retention_days = self.retention.num_days(),
            interval_secs = self.interval.as_secs(),
            "Search history retention job started"
        );

        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Search history retention job stopping");
                    break;
                }
                _ = interval.tick() => {
                    self.prune_once().await;
                }
            }
        }
    }
}
