//! Refresh type definitions
//!
//! - `RefreshTarget`: which databases to refresh
//! - `RefreshState`: per-kind state machine position
//! - `RefreshOutcome`: what a trigger did
//! - `RefreshEvent`: events broadcast to observers
//! - `RefreshStatus`: snapshot of every kind's state and last result

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::geodb::DatabaseKind;

/// Refresh target type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshTarget {
    /// A single database kind
    Kind(DatabaseKind),
    /// location, asn and proxy in order
    All,
}

impl RefreshTarget {
    pub fn kinds(&self) -> Vec<DatabaseKind> {
        match self {
            RefreshTarget::Kind(kind) => vec![*kind],
            RefreshTarget::All => DatabaseKind::all().collect(),
        }
    }
}

impl std::fmt::Display for RefreshTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshTarget::Kind(kind) => write!(f, "{}", kind),
            RefreshTarget::All => write!(f, "all"),
        }
    }
}

/// Per-kind refresh state
///
/// `Idle → Fetching → Validating → Installing → Idle`; any active state may
/// end in `Failed`, which is recorded and then returns to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshState {
    #[default]
    Idle,
    Fetching,
    Validating,
    Installing,
    Failed,
}

impl RefreshState {
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            RefreshState::Fetching | RefreshState::Validating | RefreshState::Installing
        )
    }
}

impl std::fmt::Display for RefreshState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RefreshState::Idle => "idle",
            RefreshState::Fetching => "fetching",
            RefreshState::Validating => "validating",
            RefreshState::Installing => "installing",
            RefreshState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of one refresh cycle of one kind
#[derive(Debug, Clone, Serialize)]
pub struct RefreshResult {
    pub kind: DatabaseKind,
    pub success: bool,
    /// Error message if failed
    pub message: Option<String>,
    /// Generation installed by this cycle
    pub generation: Option<u64>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl RefreshResult {
    pub fn success(kind: DatabaseKind, started_at: DateTime<Utc>, generation: u64) -> Self {
        let finished_at = Utc::now();
        let duration_ms = (finished_at - started_at).num_milliseconds().max(0) as u64;
        Self {
            kind,
            success: true,
            message: None,
            generation: Some(generation),
            started_at,
            finished_at,
            duration_ms,
        }
    }

    pub fn failure(kind: DatabaseKind, started_at: DateTime<Utc>, error: String) -> Self {
        let finished_at = Utc::now();
        let duration_ms = (finished_at - started_at).num_milliseconds().max(0) as u64;
        Self {
            kind,
            success: false,
            message: Some(error),
            generation: None,
            started_at,
            finished_at,
            duration_ms,
        }
    }
}

/// What a refresh trigger did
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// Every requested kind ran a full cycle and was installed
    Completed { results: Vec<RefreshResult> },
    /// A requested kind was already refreshing; the trigger started nothing
    Coalesced {
        kinds: Vec<(DatabaseKind, RefreshState)>,
    },
}

impl RefreshOutcome {
    pub fn is_coalesced(&self) -> bool {
        matches!(self, RefreshOutcome::Coalesced { .. })
    }
}

/// Events emitted during refresh operations
#[derive(Debug, Clone)]
pub enum RefreshEvent {
    Started { kind: DatabaseKind },
    Completed { result: RefreshResult },
    Failed { kind: DatabaseKind, error: String },
    Coalesced { kind: DatabaseKind, state: RefreshState },
}

/// State and last result of one kind
#[derive(Debug, Clone, Default, Serialize)]
pub struct KindStatus {
    pub state: RefreshState,
    pub last_result: Option<RefreshResult>,
    /// Id of the trigger that currently owns this kind
    #[serde(skip)]
    pub(crate) claim: Option<u64>,
}

impl KindStatus {
    /// A refresh owns this kind; new triggers for it are coalesced
    pub fn is_claimed(&self) -> bool {
        self.claim.is_some()
    }
}

/// Current status of the refresh system
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshStatus {
    pub location: KindStatus,
    pub asn: KindStatus,
    pub proxy: KindStatus,
}

impl RefreshStatus {
    pub fn get(&self, kind: DatabaseKind) -> &KindStatus {
        match kind {
            DatabaseKind::Location => &self.location,
            DatabaseKind::Asn => &self.asn,
            DatabaseKind::Proxy => &self.proxy,
        }
    }

    pub fn get_mut(&mut self, kind: DatabaseKind) -> &mut KindStatus {
        match kind {
            DatabaseKind::Location => &mut self.location,
            DatabaseKind::Asn => &mut self.asn,
            DatabaseKind::Proxy => &mut self.proxy,
        }
    }

    pub fn is_refreshing(&self) -> bool {
        DatabaseKind::all().any(|k| {
            let entry = self.get(k);
            entry.is_claimed() || entry.state.is_active()
        })
    }
}
