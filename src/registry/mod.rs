//! Database registry
//!
//! Holds the currently installed handle for each [`DatabaseKind`] behind a
//! single `ArcSwap`. Readers take a lock-free snapshot; the refresh path
//! publishes a new state with `rcu`. A superseded handle stays alive until the
//! last request holding its `Arc` finishes.

use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{IpGeoError, Result};
use crate::geodb::{DatabaseKind, GeoDatabase};

/// Cross-kind install policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsistencyPolicy {
    /// 每个类型独立替换
    #[default]
    Independent,
    /// 所有类型准备完毕后一次性替换，任一失败则都不替换
    Atomic,
}

impl std::str::FromStr for ConsistencyPolicy {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "independent" => Ok(Self::Independent),
            "atomic" => Ok(Self::Atomic),
            _ => Err(format!(
                "Invalid consistency policy: '{}'. Valid: independent, atomic",
                s
            )),
        }
    }
}

/// A handle together with the generation it was installed in
#[derive(Debug)]
pub struct InstalledDatabase {
    pub database: Arc<GeoDatabase>,
    pub generation: u64,
    pub installed_at: DateTime<Utc>,
}

/// One consistent view of every slot
#[derive(Debug, Clone, Default)]
pub struct RegistryState {
    slots: [Option<Arc<InstalledDatabase>>; DatabaseKind::COUNT],
    generation: u64,
}

impl RegistryState {
    pub fn get(&self, kind: DatabaseKind) -> Option<&Arc<InstalledDatabase>> {
        self.slots[kind.index()].as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// 尚未加载的类型
    pub fn missing_kinds(&self) -> Vec<DatabaseKind> {
        DatabaseKind::all()
            .filter(|k| self.slots[k.index()].is_none())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }
}

pub struct DatabaseRegistry {
    state: ArcSwap<RegistryState>,
}

impl Default for DatabaseRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DatabaseRegistry {
    pub fn new() -> Self {
        Self {
            state: ArcSwap::from_pointee(RegistryState::default()),
        }
    }

    /// Current handle for `kind`, or `NotReady` before its first install
    pub fn get(&self, kind: DatabaseKind) -> Result<Arc<InstalledDatabase>> {
        self.state
            .load()
            .get(kind)
            .cloned()
            .ok_or_else(|| IpGeoError::not_ready(format!("{} database is not loaded", kind)))
    }

    pub fn snapshot(&self) -> Arc<RegistryState> {
        self.state.load_full()
    }

    /// Install one handle and return the new generation
    pub fn swap(&self, database: GeoDatabase) -> u64 {
        self.install(vec![Arc::new(database)])
    }

    /// Install several handles in one store; all become visible together.
    ///
    /// Returns `None` when `databases` is empty.
    pub fn swap_all(&self, databases: Vec<GeoDatabase>) -> Option<u64> {
        if databases.is_empty() {
            return None;
        }
        Some(self.install(databases.into_iter().map(Arc::new).collect()))
    }

    fn install(&self, databases: Vec<Arc<GeoDatabase>>) -> u64 {
        let installed_at = Utc::now();

        let previous = self.state.rcu(|current| {
            let generation = current.generation + 1;
            let mut next = RegistryState::clone(current);
            for database in &databases {
                next.slots[database.kind().index()] = Some(Arc::new(InstalledDatabase {
                    database: database.clone(),
                    generation,
                    installed_at,
                }));
            }
            next.generation = generation;
            next
        });

        // rcu 返回替换前的状态
        let generation = previous.generation + 1;
        let kinds: Vec<String> = databases.iter().map(|d| d.kind().to_string()).collect();
        info!(
            "Installed {} database generation {}",
            kinds.join(", "),
            generation
        );
        generation
    }

    pub fn generation(&self) -> u64 {
        self.state.load().generation
    }

    pub fn is_ready(&self, kind: DatabaseKind) -> bool {
        self.state.load().get(kind).is_some()
    }

    pub fn ready_kinds(&self) -> Vec<DatabaseKind> {
        let state = self.state.load();
        DatabaseKind::all()
            .filter(|k| state.get(*k).is_some())
            .collect()
    }
}
