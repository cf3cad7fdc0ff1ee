//! ipgeo - IP geolocation, ASN and proxy lookup service
//!
//! Serves lookups from three IP2Location BIN databases (location, ASN,
//! proxy) and keeps them fresh by downloading new archives in the
//! background and swapping them in without interrupting readers.
//!
//! # Features
//! - **server**: HTTP server mode (default)
//! - **cli**: Command-line interface
//!
//! # Architecture
//! - `geodb`: BIN file parsing and range search
//! - `registry`: atomically swappable set of installed databases
//! - `refresh`: download / validate / install cycle and its scheduler
//! - `services`: combined lookup over one registry snapshot
//! - `api`: HTTP services and middleware
//! - `config`: Configuration management
//! - `runtime`: Application lifecycle and execution modes
//! - `system`: logging setup

#[cfg(feature = "server")]
pub mod api;
pub mod cli;
pub mod config;
pub mod errors;
pub mod geodb;
pub mod refresh;
pub mod registry;
pub mod runtime;
pub mod services;
pub mod system;
