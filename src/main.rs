use clap::Parser;

use ipgeo::cli::{Cli, Commands};
use ipgeo::config::{StaticConfig, get_config, init_config, init_config_with};
use ipgeo::system::logging::{init_cli_logging, init_logging};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match &cli.config {
        Some(path) => init_config_with(StaticConfig::load_from(path)),
        None => init_config(),
    }

    let config = get_config();

    // guard 需要存活到进程结束，否则缓冲的日志会丢失
    match cli.command {
        None | Some(Commands::Serve) => {
            let _log_guard = init_logging(&config.logging);
            run_server().await
        }
        Some(cmd) => {
            let code = {
                let _log_guard = init_cli_logging(&config.logging);
                run_cli(cmd).await
            };
            if code != 0 {
                std::process::exit(code);
            }
            Ok(())
        }
    }
}

#[cfg(feature = "server")]
async fn run_server() -> anyhow::Result<()> {
    ipgeo::runtime::modes::run_server().await
}

#[cfg(not(feature = "server"))]
async fn run_server() -> anyhow::Result<()> {
    anyhow::bail!("ipgeo was built without the server feature")
}

#[cfg(feature = "cli")]
async fn run_cli(cmd: Commands) -> i32 {
    match ipgeo::runtime::modes::run_cli(cmd).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{}", e.format_colored());
            1
        }
    }
}

#[cfg(not(feature = "cli"))]
async fn run_cli(_cmd: Commands) -> i32 {
    eprintln!("ipgeo was built without the cli feature");
    2
}
