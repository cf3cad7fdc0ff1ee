//! Service layer for business logic
//!
//! Shared by the HTTP API and the CLI.

mod lookup;

pub use lookup::{CombinedRecord, LookupService, proxy_status};
