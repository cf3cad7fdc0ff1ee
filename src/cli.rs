//! Command-line interface definitions using clap

use clap::{Parser, Subcommand};

use crate::geodb::DatabaseKind;

/// ipgeo - IP geolocation, ASN and proxy lookup service
#[derive(Parser)]
#[command(name = "ipgeo")]
#[command(version)]
#[command(
    about = "IP geolocation, ASN and proxy lookups backed by IP2Location BIN databases",
    long_about = None
)]
pub struct Cli {
    /// Configuration file (default: config.toml)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Download and install databases once, then exit
    Refresh {
        /// Only refresh one kind (location, asn, proxy)
        #[arg(long)]
        kind: Option<DatabaseKind>,
    },

    /// Look up an address against the databases in the data directory
    Lookup {
        /// IPv4 or IPv6 address
        address: String,
    },

    /// Show header metadata of the installed databases
    Inspect,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

/// Configuration management commands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Generate {
        /// Output path (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<String>,
    },
}
