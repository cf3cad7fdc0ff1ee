//! RefreshCoordinator trait and default implementation
//!
//! One refresh cycle of a kind: download the archive, check its signature,
//! extract the BIN file to a staging path, open it as a full database handle,
//! rename it over the live file and publish it in the registry.
//! Failures never touch the handle that is currently serving.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::errors::{IpGeoError, Result};
use crate::geodb::{DatabaseKind, GeoDatabase};
use crate::registry::{ConsistencyPolicy, DatabaseRegistry};

use super::archive::{StagingFiles, extract_entry, validate_signature};
use super::layout::StorageLayout;
use super::source::DistributionSource;
use super::types::{
    RefreshEvent, RefreshOutcome, RefreshResult, RefreshState, RefreshStatus, RefreshTarget,
};

/// RefreshCoordinator trait
#[async_trait]
pub trait RefreshCoordinator: Send + Sync {
    /// Run a refresh cycle for every kind in `target`.
    ///
    /// Returns `Coalesced` without doing any work when one of the kinds is
    /// already being refreshed.
    async fn refresh(&self, target: RefreshTarget) -> Result<RefreshOutcome>;

    /// Get the current refresh status
    fn status(&self) -> RefreshStatus;

    /// Subscribe to refresh events
    fn subscribe(&self) -> broadcast::Receiver<RefreshEvent>;
}

/// A validated handle waiting to be installed
struct Prepared {
    kind: DatabaseKind,
    database: GeoDatabase,
    started_at: chrono::DateTime<Utc>,
}

pub struct DefaultRefreshCoordinator {
    registry: Arc<DatabaseRegistry>,
    source: Arc<dyn DistributionSource>,
    layout: StorageLayout,
    policy: ConsistencyPolicy,
    status: Mutex<RefreshStatus>,
    next_claim: AtomicU64,
    event_sender: broadcast::Sender<RefreshEvent>,
}

/// Ownership of a set of kinds for one refresh trigger.
///
/// A kind stays claimed until its staging files are gone; only the claim that
/// owns a kind may hand it back to `Idle`. Dropping the guard (including when
/// the refresh future is cancelled) releases whatever is still held.
struct ClaimGuard<'a> {
    status: &'a Mutex<RefreshStatus>,
    id: u64,
    kinds: Vec<DatabaseKind>,
}

impl ClaimGuard<'_> {
    fn release(&mut self, kind: DatabaseKind) {
        self.kinds.retain(|k| *k != kind);
        Self::release_owned(&mut self.status.lock(), self.id, kind);
    }

    fn release_owned(status: &mut RefreshStatus, id: u64, kind: DatabaseKind) {
        let entry = status.get_mut(kind);
        if entry.claim == Some(id) {
            entry.claim = None;
            entry.state = RefreshState::Idle;
        }
    }
}

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        let mut status = self.status.lock();
        for kind in self.kinds.drain(..) {
            Self::release_owned(&mut status, self.id, kind);
        }
    }
}

impl DefaultRefreshCoordinator {
    pub fn new(
        registry: Arc<DatabaseRegistry>,
        source: Arc<dyn DistributionSource>,
        layout: StorageLayout,
        policy: ConsistencyPolicy,
    ) -> Self {
        let (sender, _) = broadcast::channel(32);
        Self {
            registry,
            source,
            layout,
            policy,
            status: Mutex::new(RefreshStatus::default()),
            next_claim: AtomicU64::new(1),
            event_sender: sender,
        }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// 检查并占用目标类型；任一类型正在刷新则整体合并
    fn claim(&self, kinds: &[DatabaseKind]) -> std::result::Result<ClaimGuard<'_>, RefreshOutcome> {
        let mut status = self.status.lock();

        let busy: Vec<(DatabaseKind, RefreshState)> = kinds
            .iter()
            .filter(|k| status.get(**k).is_claimed())
            .map(|k| (*k, status.get(*k).state))
            .collect();
        if !busy.is_empty() {
            return Err(RefreshOutcome::Coalesced { kinds: busy });
        }

        let id = self.next_claim.fetch_add(1, Ordering::Relaxed);
        for kind in kinds {
            let entry = status.get_mut(*kind);
            entry.claim = Some(id);
            entry.state = RefreshState::Fetching;
        }
        Ok(ClaimGuard {
            status: &self.status,
            id,
            kinds: kinds.to_vec(),
        })
    }

    fn set_state(&self, kind: DatabaseKind, state: RefreshState) {
        self.status.lock().get_mut(kind).state = state;
    }

    fn record(&self, result: RefreshResult) {
        let kind = result.kind;
        if result.success {
            let _ = self.event_sender.send(RefreshEvent::Completed {
                result: result.clone(),
            });
        } else {
            let message = result.message.clone().unwrap_or_default();
            error!("Refresh of {} database failed: {}", kind, message);
            let _ = self
                .event_sender
                .send(RefreshEvent::Failed { kind, error: message });
        }

        // 状态由持有者释放时复位，这里只记录结果
        let mut status = self.status.lock();
        let entry = status.get_mut(kind);
        if !result.success {
            entry.state = RefreshState::Failed;
        }
        entry.last_result = Some(result);
    }

    /// Fetch, validate, extract and open one kind without installing it
    async fn prepare(&self, kind: DatabaseKind, staging: &mut StagingFiles) -> Result<GeoDatabase> {
        let source = self.layout.source(kind);
        let archive = self.layout.archive_path(kind);
        let staged = self.layout.staged_path(kind);

        tokio::fs::create_dir_all(self.layout.data_dir())
            .await
            .map_err(|e| {
                IpGeoError::file_operation(format!(
                    "Failed to create data directory {}: {}",
                    self.layout.data_dir().display(),
                    e
                ))
            })?;

        self.set_state(kind, RefreshState::Fetching);
        staging.track(&archive);
        self.source.fetch(&source.code, &archive).await?;

        self.set_state(kind, RefreshState::Validating);
        staging.track(&staged);
        let entry = source.file.clone();
        let (archive_path, staged_path) = (archive.clone(), staged.clone());
        let database = tokio::task::spawn_blocking(move || {
            validate_signature(&archive_path)?;
            extract_entry(&archive_path, &entry, &staged_path)?;
            GeoDatabase::open(&staged_path, kind)
        })
        .await
        .map_err(|e| IpGeoError::file_operation(format!("Validation task failed: {}", e)))??;

        Ok(database)
    }

    /// Move the staged file over the live one and publish the handle
    fn commit(&self, prepared: Vec<Prepared>, staging: &mut StagingFiles) -> Vec<RefreshResult> {
        let mut databases = Vec::with_capacity(prepared.len());
        let mut started = Vec::with_capacity(prepared.len());

        for Prepared {
            kind,
            database,
            started_at,
        } in prepared
        {
            self.set_state(kind, RefreshState::Installing);
            let staged = self.layout.staged_path(kind);
            let live = self.layout.live_path(kind);

            let database = match std::fs::rename(&staged, &live) {
                Ok(()) => {
                    staging.keep(&staged);
                    database.with_path(live)
                }
                Err(e) => {
                    // 句柄已映射暂存文件，内存中仍可安装；暂存文件稍后清理
                    warn!(
                        "Failed to move {} to {}: {}; serving the new {} data from memory",
                        staged.display(),
                        live.display(),
                        e,
                        kind
                    );
                    database
                }
            };
            databases.push(database);
            started.push((kind, started_at));
        }

        let generations: Vec<u64> = match self.policy {
            ConsistencyPolicy::Atomic => self
                .registry
                .swap_all(databases)
                .map(|g| vec![g; started.len()])
                .unwrap_or_default(),
            ConsistencyPolicy::Independent => databases
                .into_iter()
                .map(|db| self.registry.swap(db))
                .collect(),
        };

        started
            .into_iter()
            .zip(generations)
            .map(|((kind, started_at), generation)| {
                RefreshResult::success(kind, started_at, generation)
            })
            .collect()
    }

    async fn refresh_independent(
        &self,
        claim: &mut ClaimGuard<'_>,
        kinds: &[DatabaseKind],
    ) -> (Vec<RefreshResult>, Option<IpGeoError>) {
        let mut results = Vec::new();
        let mut first_error = None;

        for &kind in kinds {
            let started_at = Utc::now();
            let _ = self.event_sender.send(RefreshEvent::Started { kind });
            let mut staging = StagingFiles::new();

            match self.prepare(kind, &mut staging).await {
                Ok(database) => {
                    let committed = self.commit(
                        vec![Prepared {
                            kind,
                            database,
                            started_at,
                        }],
                        &mut staging,
                    );
                    for result in committed {
                        self.record(result.clone());
                        results.push(result);
                    }
                }
                Err(e) => {
                    let result = RefreshResult::failure(kind, started_at, e.to_string());
                    self.record(result.clone());
                    results.push(result);
                    first_error.get_or_insert(e);
                }
            }
            staging.cleanup();
            claim.release(kind);
        }

        (results, first_error)
    }

    async fn refresh_atomic(&self, kinds: &[DatabaseKind]) -> (Vec<RefreshResult>, Option<IpGeoError>) {
        let mut staging = StagingFiles::new();
        let mut prepared = Vec::with_capacity(kinds.len());

        for &kind in kinds {
            let started_at = Utc::now();
            let _ = self.event_sender.send(RefreshEvent::Started { kind });

            match self.prepare(kind, &mut staging).await {
                Ok(database) => prepared.push(Prepared {
                    kind,
                    database,
                    started_at,
                }),
                Err(e) => {
                    // 任一类型失败：所有类型都不安装
                    warn!("Atomic refresh aborted at {}: {}", kind, e);
                    let results: Vec<RefreshResult> = kinds
                        .iter()
                        .map(|k| {
                            let text = if *k == kind {
                                e.to_string()
                            } else {
                                format!("aborted: {} refresh failed", kind)
                            };
                            RefreshResult::failure(*k, started_at, text)
                        })
                        .collect();
                    for result in &results {
                        self.record(result.clone());
                    }
                    staging.cleanup();
                    return (results, Some(e));
                }
            }
        }

        let results = self.commit(prepared, &mut staging);
        for result in &results {
            self.record(result.clone());
        }
        staging.cleanup();
        (results, None)
    }
}

#[async_trait]
impl RefreshCoordinator for DefaultRefreshCoordinator {
    async fn refresh(&self, target: RefreshTarget) -> Result<RefreshOutcome> {
        let kinds = target.kinds();
        let mut claim = match self.claim(&kinds) {
            Ok(guard) => guard,
            Err(coalesced) => {
                if let RefreshOutcome::Coalesced { kinds: busy } = &coalesced {
                    for (kind, state) in busy {
                        info!("Refresh of {} already {}, coalescing trigger", kind, state);
                        let _ = self.event_sender.send(RefreshEvent::Coalesced {
                            kind: *kind,
                            state: *state,
                        });
                    }
                }
                return Ok(coalesced);
            }
        };

        info!("Starting {} database refresh", target);
        let (results, failure) = match self.policy {
            ConsistencyPolicy::Independent => self.refresh_independent(&mut claim, &kinds).await,
            ConsistencyPolicy::Atomic => self.refresh_atomic(&kinds).await,
        };

        drop(claim);

        match failure {
            Some(e) => Err(e),
            None => {
                info!(
                    "Database refresh of {} completed, generation {}",
                    target,
                    self.registry.generation()
                );
                Ok(RefreshOutcome::Completed { results })
            }
        }
    }

    fn status(&self) -> RefreshStatus {
        self.status.lock().clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<RefreshEvent> {
        self.event_sender.subscribe()
    }
}
