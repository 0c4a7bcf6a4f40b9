use std::sync::Arc;

use tokio::task::JoinHandle;

use super::coordinator::ShutdownCoordinator;

/// 等待 SIGINT 或 SIGTERM（非 unix 平台只有 Ctrl-C），返回信号名
pub async fn wait_for_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => "SIGINT",
        () = terminate => "SIGTERM",
    }
}

/// 把终止信号转换为一次关闭请求；之后的信号只记录不处理
pub fn spawn_signal_listener(coordinator: Arc<ShutdownCoordinator>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let signal = wait_for_signal().await;
            if coordinator.trigger() {
                tracing::info!(signal, "Caught signal, starting graceful shutdown");
            } else {
                tracing::warn!(signal, "Shutdown already in progress, ignoring signal");
            }
        }
    })
}
