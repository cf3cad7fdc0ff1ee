//! CLI mode
//!
//! One-shot commands that work directly on the data directory, without a
//! running server.

use std::fmt;
use std::sync::Arc;

use colored::Colorize;

use crate::cli::{Commands, ConfigCommands};
use crate::config::{StaticConfig, get_config};
use crate::errors::IpGeoError;
use crate::geodb::{DatabaseKind, GeoDatabase};
use crate::refresh::{RefreshOutcome, RefreshResult, RefreshTarget, StorageLayout, load_local};
use crate::registry::DatabaseRegistry;
use crate::runtime::lifetime::startup::build_refresh_stack;
use crate::services::LookupService;

#[derive(Debug)]
pub enum CliError {
    Command(IpGeoError),
    Setup(String),
}

impl CliError {
    pub fn format_colored(&self) -> String {
        match self {
            CliError::Command(e) => e.format_colored(),
            CliError::Setup(msg) => format!("{} {}", "Setup error:".red().bold(), msg.white()),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Command(e) => write!(f, "{}", e.format_simple()),
            CliError::Setup(msg) => write!(f, "Setup error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {}

impl From<IpGeoError> for CliError {
    fn from(err: IpGeoError) -> Self {
        CliError::Command(err)
    }
}

/// Run a CLI command from clap-parsed input
pub async fn run_cli(cmd: Commands) -> Result<(), CliError> {
    let config = get_config();

    match cmd {
        Commands::Serve => unreachable!("serve handled in main"),
        Commands::Refresh { kind } => refresh(&config, kind).await,
        Commands::Lookup { address } => lookup(&config, &address),
        Commands::Inspect => inspect(&config),
        Commands::Config { action } => match action {
            ConfigCommands::Generate { output } => generate_config(output),
        },
    }
}

async fn refresh(config: &StaticConfig, kind: Option<DatabaseKind>) -> Result<(), CliError> {
    let (_, coordinator) =
        build_refresh_stack(config).map_err(|e| CliError::Setup(format!("{:#}", e)))?;
    let target = kind.map(RefreshTarget::Kind).unwrap_or(RefreshTarget::All);

    println!("{} {}", "Refreshing".yellow(), target.to_string().cyan());
    let result = coordinator.refresh(target).await;

    // 失败时也打印每个类型的结果
    for kind in target.kinds() {
        if let Some(last) = &coordinator.status().get(kind).last_result {
            print_result(last);
        }
    }

    match result? {
        RefreshOutcome::Completed { .. } => {
            println!("{}", "Database refreshed successfully".green().bold());
        }
        RefreshOutcome::Coalesced { .. } => {
            println!("{}", "Refresh already in progress".yellow());
        }
    }
    Ok(())
}

fn print_result(result: &RefreshResult) {
    if result.success {
        println!(
            "  {} {} {}",
            "✓".green(),
            result.kind.to_string().cyan(),
            format!(
                "(generation {}, {} ms)",
                result.generation.unwrap_or_default(),
                result.duration_ms
            )
            .dimmed()
        );
    } else {
        println!(
            "  {} {} {}",
            "✗".red(),
            result.kind.to_string().cyan(),
            result.message.as_deref().unwrap_or("failed").red()
        );
    }
}

fn lookup(config: &StaticConfig, address: &str) -> Result<(), CliError> {
    let registry = Arc::new(DatabaseRegistry::new());
    load_local(&registry, &StorageLayout::from_config(config));

    let record = LookupService::new(registry).resolve(address)?;
    println!("{}", serde_json::to_string_pretty(&record).map_err(IpGeoError::from)?);
    Ok(())
}

fn inspect(config: &StaticConfig) -> Result<(), CliError> {
    let layout = StorageLayout::from_config(config);
    println!(
        "{} {}",
        "Data directory:".bold(),
        layout.data_dir().display().to_string().blue()
    );

    for kind in DatabaseKind::all() {
        let path = layout.live_path(kind);
        if !path.exists() {
            println!("{} {}", kind.to_string().cyan().bold(), "not installed".yellow());
            continue;
        }

        match GeoDatabase::open(&path, kind) {
            Ok(db) => {
                let metadata =
                    serde_json::to_string_pretty(&db.metadata()).map_err(IpGeoError::from)?;
                println!("{} {}", kind.to_string().cyan().bold(), path.display());
                println!("{}", metadata);
            }
            Err(e) => println!(
                "{} {} {}",
                kind.to_string().cyan().bold(),
                path.display(),
                e.format_simple().red()
            ),
        }
    }
    Ok(())
}

fn generate_config(output: Option<String>) -> Result<(), CliError> {
    let Some(path) = output else {
        print!("{}", StaticConfig::generate_sample_config());
        return Ok(());
    };

    StaticConfig::default()
        .save_to_file(&path)
        .map_err(|e| CliError::Setup(format!("Unable to write configuration file: {}", e)))?;
    println!(
        "  {} {}",
        "Configuration file generated successfully".green(),
        path.blue()
    );
    Ok(())
}
