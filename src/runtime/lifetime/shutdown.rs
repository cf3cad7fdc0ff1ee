use std::time::Duration;

use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// 关闭超时时间（秒）
const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Wait for Ctrl+C (or SIGTERM on Unix)
pub async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal as unix_signal};

        match unix_signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    res = signal::ctrl_c() => log_ctrl_c(res),
                    _ = term.recv() => info!("SIGTERM received, shutting down..."),
                }
                return;
            }
            Err(e) => warn!("Failed to listen for SIGTERM: {}", e),
        }
    }

    log_ctrl_c(signal::ctrl_c().await);
}

fn log_ctrl_c(res: std::io::Result<()>) {
    match res {
        Ok(()) => info!("Shutdown signal received, stopping refresh scheduler..."),
        Err(e) => warn!(
            "Failed to listen for Ctrl+C: {}. Proceeding with shutdown anyway.",
            e
        ),
    }
}

/// 等待关闭信号，然后通知刷新调度器退出
///
/// 正在进行的刷新最多等待 `SHUTDOWN_TIMEOUT_SECS`；超时只放弃等待，
/// 暂存文件由刷新自身的清理逻辑处理。
pub async fn listen_for_shutdown(shutdown: watch::Sender<bool>, scheduler: JoinHandle<()>) {
    wait_for_signal().await;

    let _ = shutdown.send(true);

    match timeout(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS), scheduler).await {
        Ok(Ok(())) => info!("Refresh scheduler stopped cleanly"),
        Ok(Err(e)) => error!("Refresh scheduler task failed: {}", e),
        Err(_) => error!(
            "Refresh scheduler did not stop within {} seconds",
            SHUTDOWN_TIMEOUT_SECS
        ),
    }
}
