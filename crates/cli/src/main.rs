//! MOIM CLI - talk to the MOIM MOIM meetup API from a terminal

mod commands;
mod config;
mod logging;
mod session;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use commands::Commands;
use std::path::PathBuf;
use tracing::{Level, debug, error};

#[derive(Parser)]
#[command(name = "moim")]
#[command(about = "Command-line client for the MOIM MOIM meetup API")]
#[command(version)]
struct Cli {
    /// Set logging level
    #[arg(short = 'l', long, global = true, default_value = "warn")]
    log_level: LogLevel,

    /// Data directory for the session, cookies, config and logs
    #[arg(short = 'd', long, global = true, env = "MOIM_STATE_DIR")]
    data_dir: Option<PathBuf>,

    /// Configuration file (defaults to <data_dir>/moim.toml)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// API root, e.g. http://localhost:8080/api
    #[arg(short = 'u', long, global = true, env = "MOIM_BASE_URL")]
    base_url: Option<String>,

    /// Per-request timeout in milliseconds (0 = no timeout)
    #[arg(short = 't', long, global = true)]
    timeout_ms: Option<u64>,

    /// Disable file logging (only log to stderr)
    #[arg(long, global = true)]
    no_file_log: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let data_dir = config::resolve_data_dir(cli.data_dir);
    logging::init_logging(cli.log_level.into(), &data_dir, cli.no_file_log)?;

    let mut settings = config::CliConfig::load(cli.config.as_deref(), &data_dir)?;
    if let Some(base_url) = cli.base_url {
        settings.client.base_url = base_url;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        settings.client.timeout_ms = timeout_ms;
    }
    debug!(data_dir = %data_dir.display(), base_url = %settings.client.base_url, "Starting MOIM CLI");

    if let Err(e) = cli.command.execute(settings, data_dir).await {
        error!("Command failed: {e:#}");
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }

    Ok(())
}

#[derive(Clone, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::Error => Self::ERROR,
            LogLevel::Warn => Self::WARN,
            LogLevel::Info => Self::INFO,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Trace => Self::TRACE,
        }
    }
}
