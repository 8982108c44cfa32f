//! ScriptMirror CLI - Command-line interface for ScriptMirror
//!
//! Provides commands for:
//! - Mirroring a repository ref into a remote script project
//! - Checking the remote login
//! - Inspecting persisted state and sync history
//! - Releasing a stale sync lock
//! - Viewing and validating configuration

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use scriptmirror_core::config::{Config, LoggingConfig};

mod commands;
mod output;

use commands::{
    config::ConfigCommand, history::HistoryCommand, login::LoginCommand, state::StateCommand,
    sync::SyncCommand, unlock::UnlockCommand,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "scriptmirror",
    version,
    about = "Mirror script units from a source repository into a remote script server"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Synchronize a repository ref into a remote project
    Sync(SyncCommand),
    /// Log in to the remote server and report the session state
    Login(LoginCommand),
    /// Show the persisted inventory of a target
    State(StateCommand),
    /// Show recent sync runs of a target
    History(HistoryCommand),
    /// Release a stale sync lock
    Unlock(UnlockCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

fn init_tracing(verbose: u8, logging: &LoggingConfig) {
    let level = match verbose {
        0 => logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let loaded = Config::load(&config_path);

    let logging = loaded
        .as_ref()
        .map(|config| config.logging.clone())
        .unwrap_or_default();
    init_tracing(cli.verbose, &logging);

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    if let Commands::Config(cmd) = &cli.command {
        return cmd.execute(&config_path, loaded, format).await;
    }

    let mut config = loaded
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
    config.apply_env_overrides();

    match cli.command {
        Commands::Sync(cmd) => cmd.execute(&config, format).await,
        Commands::Login(cmd) => cmd.execute(&config, format).await,
        Commands::State(cmd) => cmd.execute(&config, format).await,
        Commands::History(cmd) => cmd.execute(&config, format).await,
        Commands::Unlock(cmd) => cmd.execute(&config, format).await,
        // dispatched above, before the file is required to load
        Commands::Config(_) => Ok(()),
    }
}
