use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::config::StaticConfig;
use crate::geodb::DatabaseKind;
use crate::refresh::{
    DefaultRefreshCoordinator, Ip2LocationSource, RefreshCoordinator, RefreshScheduler,
    StorageLayout, load_local, sweep_staging,
};
use crate::registry::DatabaseRegistry;
use crate::services::LookupService;

pub struct StartupContext {
    pub registry: Arc<DatabaseRegistry>,
    pub lookup_service: LookupService,
    pub coordinator: Arc<dyn RefreshCoordinator>,
    pub scheduler: RefreshScheduler,
}

/// 构建 registry 与刷新组件，不含 HTTP 部分
///
/// 数据目录中已有的数据库文件会立即加载，服务可以在第一次刷新前就开始响应。
pub fn build_refresh_stack(
    config: &StaticConfig,
) -> Result<(Arc<DatabaseRegistry>, Arc<dyn RefreshCoordinator>)> {
    let layout = StorageLayout::from_config(config);
    std::fs::create_dir_all(layout.data_dir()).with_context(|| {
        format!(
            "Failed to create data directory {}",
            layout.data_dir().display()
        )
    })?;

    // 上次刷新中断时残留的暂存文件
    let swept = sweep_staging(&layout);
    if swept > 0 {
        debug!("Removed {} stale staging files", swept);
    }

    let registry = Arc::new(DatabaseRegistry::new());
    let loaded = load_local(&registry, &layout)
        .into_iter()
        .filter(|(_, result)| result.is_ok())
        .count();
    debug!(
        "{} of {} databases loaded from {}",
        loaded,
        DatabaseKind::COUNT,
        layout.data_dir().display()
    );

    if config.refresh.token.is_empty() {
        warn!("No IP2Location download token configured, refreshes will fail until one is set");
    }

    let source = Arc::new(Ip2LocationSource::new(&config.refresh));
    let coordinator: Arc<dyn RefreshCoordinator> = Arc::new(DefaultRefreshCoordinator::new(
        registry.clone(),
        source,
        layout,
        config.refresh.consistency,
    ));

    Ok((registry, coordinator))
}

/// 准备服务器启动的上下文
pub async fn prepare_server_startup(config: &StaticConfig) -> Result<StartupContext> {
    let start_time = std::time::Instant::now();
    debug!("Starting pre-startup processing...");

    let (registry, coordinator) =
        build_refresh_stack(config).context("Failed to prepare database registry")?;

    let scheduler = RefreshScheduler::new(
        coordinator.clone(),
        Duration::from_secs(config.refresh.interval_secs),
        config.refresh.on_startup,
    );

    let ready = registry.ready_kinds();
    if ready.len() < DatabaseKind::COUNT {
        warn!(
            "Starting with {} of {} databases ready; /ip returns 503 until the rest are installed",
            ready.len(),
            DatabaseKind::COUNT
        );
    }

    info!(
        "Pre-startup processing completed in {} ms",
        start_time.elapsed().as_millis()
    );

    Ok(StartupContext {
        lookup_service: LookupService::new(registry.clone()),
        registry,
        coordinator,
        scheduler,
    })
}
