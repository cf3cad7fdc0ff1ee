//! 启动时加载数据目录中已有的数据库文件

use std::sync::Arc;

use tracing::{info, warn};

use crate::errors::{IpGeoError, Result};
use crate::geodb::{DatabaseKind, GeoDatabase};
use crate::registry::DatabaseRegistry;

use super::layout::StorageLayout;

/// Open every live file in the data directory and install it.
///
/// Missing or corrupt files are reported per kind; the kind simply stays
/// unavailable until a refresh installs it.
pub fn load_local(
    registry: &Arc<DatabaseRegistry>,
    layout: &StorageLayout,
) -> Vec<(DatabaseKind, Result<u64>)> {
    DatabaseKind::all()
        .map(|kind| {
            let path = layout.live_path(kind);
            let result = if path.exists() {
                GeoDatabase::open(&path, kind).map(|db| registry.swap(db))
            } else {
                Err(IpGeoError::file_operation(format!(
                    "{} not found",
                    path.display()
                )))
            };

            match &result {
                Ok(generation) => info!(
                    "Loaded {} database from {} (generation {})",
                    kind,
                    path.display(),
                    generation
                ),
                Err(e) => warn!("{} database unavailable: {}", kind, e),
            }
            (kind, result)
        })
        .collect()
}

/// Remove `<file>.new` and `<code>.zip` left behind by an interrupted refresh.
///
/// Only call this before a coordinator starts working on the same data
/// directory. Returns the number of files removed.
pub fn sweep_staging(layout: &StorageLayout) -> usize {
    DatabaseKind::all()
        .flat_map(|kind| [layout.staged_path(kind), layout.archive_path(kind)])
        .filter(|path| match std::fs::remove_file(path) {
            Ok(()) => {
                info!("Removed stale staging file {}", path.display());
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!("Failed to remove stale staging file {}: {}", path.display(), e);
                false
            }
        })
        .count()
}
