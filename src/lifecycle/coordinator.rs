use std::future::Future;
use std::io;
use std::sync::OnceLock;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::tasks::BackgroundTasks;

/// 进程生命周期阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Running,
    ShuttingDown,
    Drained,
    Stopped,
}

/// 成功关闭的结果
#[derive(Debug, Clone, Copy)]
pub struct ShutdownReport {
    /// 从关闭开始到全部工作完成所用时间
    pub elapsed: Duration,
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("shutdown grace period of {grace_period:?} elapsed with {outstanding} background task(s) outstanding")]
    ShutdownTimeout {
        grace_period: Duration,
        outstanding: usize,
    },
    #[error("server error: {0}")]
    Server(#[from] io::Error),
}

/// 关闭协调器
///
/// 只负责时序：接收一次关闭请求，取消共享令牌，然后在宽限期内等待服务器和后台任务结束。
pub struct ShutdownCoordinator {
    grace_period: Duration,
    token: CancellationToken,
    tasks: BackgroundTasks,
    phase: watch::Sender<LifecyclePhase>,
    started_at: OnceLock<Instant>,
}

impl ShutdownCoordinator {
    pub fn new(grace_period: Duration) -> Self {
        let (phase, _) = watch::channel(LifecyclePhase::Running);
        Self {
            grace_period,
            token: CancellationToken::new(),
            tasks: BackgroundTasks::new(),
            phase,
            started_at: OnceLock::new(),
        }
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// 发起关闭；关闭已开始时不做任何事并返回 false
    pub fn trigger(&self) -> bool {
        let started = self.phase.send_if_modified(|phase| {
            if *phase == LifecyclePhase::Running {
                *phase = LifecyclePhase::ShuttingDown;
                true
            } else {
                false
            }
        });

        if !started {
            return false;
        }

        // 先记录开始时间再取消令牌，run() 被唤醒时一定能读到
        let _ = self.started_at.set(Instant::now());
        tracing::info!(
            grace_period_secs = self.grace_period.as_secs_f64(),
            outstanding = self.tasks.outstanding(),
            "Shutting down"
        );
        self.token.cancel();
        true
    }

    /// 服务器和后台任务应观察的取消信号
    pub fn shutdown_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn tasks(&self) -> &BackgroundTasks {
        &self.tasks
    }

    pub fn phase(&self) -> LifecyclePhase {
        *self.phase.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecyclePhase> {
        self.phase.subscribe()
    }

    /// 运行服务器直到关闭完成
    ///
    /// `server` 应在令牌取消后停止接受新连接并等待进行中的请求结束。
    /// 服务器自行退出同样会触发关闭。
    pub async fn run<F>(&self, server: F) -> Result<ShutdownReport, LifecycleError>
    where
        F: Future<Output = io::Result<()>> + Send + 'static,
    {
        let mut server = tokio::spawn(server);
        let mut finished = None;

        tokio::select! {
            _ = self.token.cancelled() => {}
            joined = &mut server => {
                tracing::warn!("Server stopped before shutdown was requested");
                finished = Some(joined);
                self.trigger();
            }
        }

        let started = self.started_at.get().copied().unwrap_or_else(Instant::now);
        let deadline = started + self.grace_period;
        self.tasks.close();

        // 进行中的请求和后台任务同时排空
        let drain = async {
            let server_done = async {
                match finished {
                    Some(joined) => joined,
                    None => (&mut server).await,
                }
            };
            let (server_result, ()) = tokio::join!(server_done, self.tasks.wait());
            server_result
        };

        match tokio::time::timeout_at(deadline, drain).await {
            Ok(server_result) => {
                self.phase.send_replace(LifecyclePhase::Drained);
                let elapsed = started.elapsed();
                tracing::info!(elapsed_ms = elapsed.as_millis() as u64, "All work drained");
                self.phase.send_replace(LifecyclePhase::Stopped);

                match server_result {
                    Ok(Ok(())) => Ok(ShutdownReport { elapsed }),
                    Ok(Err(e)) => Err(LifecycleError::Server(e)),
                    Err(e) => Err(LifecycleError::Server(io::Error::new(io::ErrorKind::Other, e))),
                }
            }
            Err(_) => {
                server.abort();
                let outstanding = self.tasks.outstanding();
                self.phase.send_replace(LifecyclePhase::Stopped);
                Err(LifecycleError::ShutdownTimeout {
                    grace_period: self.grace_period,
                    outstanding,
                })
            }
        }
    }
}
