//! Unlock command - Release a sync lock left behind by an interrupted run

use anyhow::Result;
use clap::Args;
use tracing::warn;

use scriptmirror_core::config::Config;
use scriptmirror_core::ports::IStateStore;

use super::{open_store, TargetArgs};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct UnlockCommand {
    #[command(flatten)]
    pub target: TargetArgs,
}

impl UnlockCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let target = self.target.target()?;

        if !config.state.database.exists() {
            formatter.error("No state database found. Nothing to unlock.");
            return Ok(());
        }

        let store = open_store(config).await?;
        let Some(since) = store.locked_since(&target).await? else {
            formatter.info(&format!("No sync lock held for {target}"));
            return Ok(());
        };

        warn!(%target, since = %since, "Releasing sync lock on operator request");
        store.release_lock(&target).await?;
        formatter.success(&format!(
            "Released sync lock for {target} (held since {})",
            since.to_rfc3339()
        ));
        Ok(())
    }
}
