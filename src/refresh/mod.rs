//! Database refresh
//!
//! - `RefreshCoordinator`: fetch / validate / extract / install state machine
//! - `DistributionSource`: where archives come from
//! - `RefreshScheduler`: startup, interval and on-demand triggers
//!
//! ```ignore
//! let coordinator: Arc<dyn RefreshCoordinator> = Arc::new(DefaultRefreshCoordinator::new(
//!     registry.clone(),
//!     Arc::new(Ip2LocationSource::new(&config.refresh)),
//!     StorageLayout::from_config(&config),
//!     config.refresh.consistency,
//! ));
//! coordinator.refresh(RefreshTarget::All).await?;
//! ```

pub mod archive;
mod coordinator;
mod layout;
mod local;
mod scheduler;
mod source;
mod types;

pub use coordinator::{DefaultRefreshCoordinator, RefreshCoordinator};
pub use layout::StorageLayout;
pub use local::{load_local, sweep_staging};
pub use scheduler::RefreshScheduler;
pub use source::{DistributionSource, Ip2LocationSource};
pub use types::{
    KindStatus, RefreshEvent, RefreshOutcome, RefreshResult, RefreshState, RefreshStatus,
    RefreshTarget,
};
