//! CLI definitions for gatekeeper.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Gatekeeper CLI.
#[derive(Parser)]
#[command(name = "gatekeeper")]
#[command(about = "Run commands one at a time, with a pause after each")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "gatekeeper.toml",
        global = true,
        env = "GATEKEEPER_CONFIG"
    )]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run every configured step through the queue
    Run {
        /// Queue name, overriding the config file
        #[arg(long)]
        name: Option<String>,

        /// Keep draining after a failed step
        #[arg(long)]
        keep_going: bool,
    },

    /// Validate the configuration file
    Check,
}
