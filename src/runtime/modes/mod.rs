//! Mode routing
//!
//! - Server mode (HTTP API plus background refresh)
//! - CLI mode (one-shot refresh, lookup, inspect and config commands)

#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "cli")]
pub mod cli;

#[cfg(feature = "server")]
pub use server::run_server;

#[cfg(feature = "cli")]
pub use cli::{CliError, run_cli};
