//! 定时刷新调度
//!
//! 启动时可选执行一次，之后按固定间隔执行；也接受通过 `trigger_handle()`
//! 的手动触发（Unix 下 SIGUSR1 也走这里），收到关闭信号后退出。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, watch};
use tokio::time::{MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use super::coordinator::RefreshCoordinator;
use super::types::{RefreshOutcome, RefreshTarget};

pub struct RefreshScheduler {
    coordinator: Arc<dyn RefreshCoordinator>,
    interval: Duration,
    on_startup: bool,
    notify: Arc<Notify>,
}

impl RefreshScheduler {
    pub fn new(coordinator: Arc<dyn RefreshCoordinator>, interval: Duration, on_startup: bool) -> Self {
        Self {
            coordinator,
            interval: interval.max(Duration::from_secs(1)),
            on_startup,
            notify: Arc::new(Notify::new()),
        }
    }

    /// Handle for requesting an immediate refresh
    pub fn trigger_handle(&self) -> Arc<Notify> {
        self.notify.clone()
    }

    /// Run until `shutdown` flips to `true` or its sender is dropped
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        #[cfg(unix)]
        Self::forward_sigusr1(self.trigger_handle());

        if self.on_startup {
            info!("Running startup database refresh");
            self.run_cycle("startup").await;
        }

        let start = tokio::time::Instant::now() + self.interval;
        let mut ticker = interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Refresh scheduler started, interval {}s", self.interval.as_secs());

        loop {
            tokio::select! {
                _ = ticker.tick() => self.run_cycle("scheduled").await,
                _ = self.notify.notified() => self.run_cycle("on-demand").await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Refresh scheduler stopped");
                        break;
                    }
                }
            }
        }
    }

    async fn run_cycle(&self, reason: &str) {
        match self.coordinator.refresh(RefreshTarget::All).await {
            Ok(RefreshOutcome::Completed { results }) => {
                let total_ms: u64 = results.iter().map(|r| r.duration_ms).sum();
                info!("{} refresh completed in {}ms", reason, total_ms);
            }
            Ok(RefreshOutcome::Coalesced { .. }) => {
                debug!("{} refresh skipped, another refresh is running", reason);
            }
            // 失败不影响正在服务的数据库
            Err(e) => warn!("{} refresh failed: {}", reason, e),
        }
    }

    #[cfg(unix)]
    fn forward_sigusr1(notify: Arc<Notify>) {
        use tokio::signal::unix::{SignalKind, signal};

        tokio::spawn(async move {
            let mut stream = match signal(SignalKind::user_defined1()) {
                Ok(s) => s,
                Err(e) => {
                    warn!(
                        "Failed to create SIGUSR1 handler: {}. Refresh via signal disabled.",
                        e
                    );
                    return;
                }
            };

            while stream.recv().await.is_some() {
                info!("Received SIGUSR1, triggering database refresh...");
                notify.notify_one();
            }
        });
    }
}
