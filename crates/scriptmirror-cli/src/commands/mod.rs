//! CLI subcommands and the adapter wiring they share

pub mod config;
pub mod history;
pub mod login;
pub mod state;
pub mod sync;
pub mod unlock;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;

use scriptmirror_core::config::Config;
use scriptmirror_core::domain::TargetKey;
use scriptmirror_remote::{ScriptServerClient, SourceRepositoryClient};
use scriptmirror_store::{DatabasePool, SqliteStateStore};

/// Identifies a synchronization target on the command line
#[derive(Debug, Args)]
pub struct TargetArgs {
    /// Source repository project id
    #[arg(long)]
    pub project_id: u64,

    /// Remote domain
    #[arg(long)]
    pub domain: String,

    /// Remote project
    #[arg(long)]
    pub project: String,
}

impl TargetArgs {
    pub fn target(&self) -> Result<TargetKey> {
        TargetKey::new(self.project_id, &self.domain, &self.project).context("Invalid target")
    }
}

/// Fails with every validation error joined into one message
pub fn ensure_valid(config: &Config) -> Result<()> {
    let errors = config.validate();
    if errors.is_empty() {
        return Ok(());
    }
    let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
    bail!(
        "Invalid configuration ({} error{}): {}",
        errors.len(),
        if errors.len() == 1 { "" } else { "s" },
        messages.join("; ")
    )
}

pub async fn open_store(config: &Config) -> Result<SqliteStateStore> {
    let pool = DatabasePool::new(&config.state.database)
        .await
        .with_context(|| {
            format!(
                "Failed to open state database {}",
                config.state.database.display()
            )
        })?;
    Ok(SqliteStateStore::new(pool.pool().clone()))
}

pub fn script_server(config: &Config) -> Result<Arc<ScriptServerClient>> {
    let client = ScriptServerClient::new(&config.remote.url, config.remote.request_timeout())
        .context("Failed to create script server client")?;
    Ok(Arc::new(client))
}

pub fn source_repository(config: &Config) -> Result<Arc<SourceRepositoryClient>> {
    let client = SourceRepositoryClient::new(
        &config.source.url,
        config.source.token.clone(),
        config.source.request_timeout(),
    )
    .context("Failed to create source repository client")?;
    Ok(Arc::new(client))
}
