use std::future::Future;

use tokio_util::task::task_tracker::TaskTrackerToken;
use tokio_util::task::TaskTracker;

/// 后台任务登记表
///
/// 关闭流程在退出前等待这里登记的所有任务完成。可以克隆，克隆共享同一个登记表。
#[derive(Clone, Debug, Default)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
}

/// 一项已登记的后台工作，`complete()` 或 drop 时视为完成
#[derive(Debug)]
#[must_use = "dropping a registration marks the work as complete"]
pub struct TaskRegistration {
    _token: TaskTrackerToken,
}

impl TaskRegistration {
    pub fn complete(self) {}
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一项由调用方自行驱动的工作
    pub fn register(&self) -> TaskRegistration {
        TaskRegistration {
            _token: self.tracker.token(),
        }
    }

    /// 启动并登记一个后台任务，panic 会被记录而不会传播
    pub fn spawn<F>(&self, name: &'static str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        self.tracker.spawn(async move {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    tracing::error!(task = name, "Background task panicked");
                } else {
                    tracing::warn!(task = name, "Background task cancelled");
                }
            }
        });
    }

    /// 尚未完成的任务数量
    pub fn outstanding(&self) -> usize {
        self.tracker.len()
    }

    /// 关闭后 `wait()` 在任务清空时返回；关闭后仍可继续登记
    pub fn close(&self) {
        self.tracker.close();
    }

    pub async fn wait(&self) {
        self.tracker.wait().await;
    }
}
