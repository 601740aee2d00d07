//! Gatekeeper - delay-paced command runner
//!
//! Loads a step script from a TOML file and runs each step through a
//! `DelayQueue`, one at a time, with the configured pause after each.

mod cli;
mod cmd_check;
mod cmd_run;

use std::sync::OnceLock;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use gatekeeper_config::{ConfigLoader, LoggingConfig};

use cli::{Cli, Commands};

/// Initialize tracing with console output and an optional rolling log file.
fn init_tracing(logging: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let level = match logging.level.trim() {
        "" => "info",
        level => level,
    };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match logging.log_dir() {
        Some(log_dir) => {
            std::fs::create_dir_all(&log_dir)?;
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("gatekeeper")
                .filename_suffix("log")
                .max_log_files(30)
                .build(&log_dir)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            // Keeps the writer flushing until exit.
            static GUARD: OnceLock<WorkerGuard> = OnceLock::new();
            let _ = GUARD.set(guard);

            Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .with(file_layer)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = ConfigLoader::load(&cli.config)
        .map_err(|e| format!("failed to load {}: {}", cli.config.display(), e))?;

    init_tracing(&config.logging)?;

    match cli.command {
        Commands::Run { name, keep_going } => cmd_run::run_steps(config, name, keep_going).await,
        Commands::Check => cmd_check::check_config(&cli.config, &config),
    }
}
