//! Logging system initialization
//!
//! Builds the global tracing subscriber from the `[logging]` section.

use std::io::Write;
use std::path::Path;

use tracing_appender::rolling;

use crate::config::LoggingConfig;

type BoxedWriter = Box<dyn Write + Send + Sync>;

/// Initialize logging system based on configuration
///
/// **Note**: This should be called only once during application startup,
/// after the configuration has been loaded.
///
/// # Returns
/// * `WorkerGuard` - Must be kept alive for the duration of the program
///   to ensure non-blocking log writes are flushed
///
/// # Panics
/// * If setting the global subscriber fails (e.g., already initialized)
pub fn init_logging(config: &LoggingConfig) -> tracing_appender::non_blocking::WorkerGuard {
    init_with_console(config, Console::Stdout)
}

/// CLI 模式：控制台日志写到 stderr，stdout 只留给命令输出
pub fn init_cli_logging(config: &LoggingConfig) -> tracing_appender::non_blocking::WorkerGuard {
    init_with_console(config, Console::Stderr)
}

#[derive(Debug, Clone, Copy)]
enum Console {
    Stdout,
    Stderr,
}

impl Console {
    fn writer(self) -> BoxedWriter {
        match self {
            Console::Stdout => Box::new(std::io::stdout()),
            Console::Stderr => Box::new(std::io::stderr()),
        }
    }
}

fn init_with_console(
    config: &LoggingConfig,
    console: Console,
) -> tracing_appender::non_blocking::WorkerGuard {
    let writer = build_writer(config, console);

    let (non_blocking_writer, guard) = tracing_appender::non_blocking(writer);
    let filter = tracing_subscriber::EnvFilter::new(config.level.clone());

    let subscriber_builder = tracing_subscriber::fmt()
        .with_writer(non_blocking_writer)
        .with_env_filter(filter)
        .with_level(true)
        .with_ansi(writes_to_console(config));

    if config.format == "json" {
        subscriber_builder.json().init();
    } else {
        subscriber_builder.init();
    }

    guard
}

fn writes_to_console(config: &LoggingConfig) -> bool {
    config.file.as_ref().is_none_or(|f| f.is_empty())
}

/// 日志文件无法创建时回退到控制台，不阻止服务启动
fn build_writer(config: &LoggingConfig, console: Console) -> BoxedWriter {
    let log_file = match config.file.as_deref() {
        Some(f) if !f.is_empty() => f,
        _ => return console.writer(),
    };

    if config.enable_rotation {
        let path = Path::new(log_file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let filename = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("ipgeo.log");

        match rolling::Builder::new()
            .rotation(rolling::Rotation::DAILY)
            .filename_prefix(filename.trim_end_matches(".log"))
            .filename_suffix("log")
            .max_log_files(config.max_backups.max(1) as usize)
            .build(dir)
        {
            Ok(appender) => Box::new(appender),
            Err(e) => {
                eprintln!("[ERROR] Failed to create rolling log appender: {}", e);
                console.writer()
            }
        }
    } else {
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
        {
            Ok(file) => Box::new(file),
            Err(e) => {
                eprintln!("[ERROR] Failed to open log file {}: {}", log_file, e);
                console.writer()
            }
        }
    }
}
