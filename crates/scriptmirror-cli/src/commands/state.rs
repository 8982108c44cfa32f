//! State command - Show the persisted inventory and lock of a target
//!
//! With `--remote`, the units currently stored on the script server are
//! listed as well, so drift between the two can be spotted.

use anyhow::Result;
use clap::Args;
use serde_json::json;

use scriptmirror_core::config::Config;
use scriptmirror_core::domain::paths::short_stamp;
use scriptmirror_core::domain::{InventoryEntry, TargetKey};
use scriptmirror_core::ports::{IRemoteScriptSystem, IStateStore, RemoteUnit};
use scriptmirror_sync::SessionGuard;

use super::{ensure_valid, open_store, script_server, TargetArgs};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct StateCommand {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Also list the units stored on the script server
    #[arg(long)]
    pub remote: bool,
}

impl StateCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let target = self.target.target()?;

        if !config.state.database.exists() {
            formatter.error("No state database found. Run 'scriptmirror sync' first.");
            return Ok(());
        }

        let store = open_store(config).await?;
        let inventory = store.load(&target).await?;
        let locked_since = store.locked_since(&target).await?;
        let remote_units = if self.remote {
            Some(list_remote_units(config, &target).await?)
        } else {
            None
        };

        if format.is_json() {
            formatter.print_json(&json!({
                "target": target,
                "locked_since": locked_since,
                "entries": inventory.entries(),
                "remote_units": remote_units,
            }));
            return Ok(());
        }

        formatter.info(&format!("Target: {target}"));
        match locked_since {
            Some(at) => formatter.warn(&format!("Sync lock held since {}", at.to_rfc3339())),
            None => formatter.info("Sync lock: free"),
        }

        if inventory.is_empty() {
            formatter.info("No units recorded");
        } else {
            let rows: Vec<Vec<String>> = inventory.iter().map(entry_row).collect();
            formatter.table(&["PATH", "STAMP", "ID", "CHANGED"], &rows);
        }

        if let Some(units) = remote_units {
            formatter.info("");
            formatter.info(&format!("{} unit(s) on {}:", units.len(), config.remote.url));
            let rows: Vec<Vec<String>> = units
                .iter()
                .map(|unit| vec![unit.id.to_string(), unit.folder_path.clone(), unit.name.clone()])
                .collect();
            formatter.table(&["ID", "FOLDER", "NAME"], &rows);
        }
        Ok(())
    }
}

fn entry_row(entry: &InventoryEntry) -> Vec<String> {
    vec![
        entry.path.clone(),
        short_stamp(&entry.version_stamp),
        entry
            .remote_object_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string()),
        entry.changed_at.clone(),
    ]
}

async fn list_remote_units(config: &Config, target: &TargetKey) -> Result<Vec<RemoteUnit>> {
    ensure_valid(config)?;
    let remote = script_server(config)?;
    let session = SessionGuard::from_config(remote.clone(), &config.remote);

    session.ensure_logged_in().await?;
    session
        .ensure_project_bound(target.domain(), target.project())
        .await?;
    let units = remote.list_units(target.domain(), target.project()).await;
    session.logout().await;
    Ok(units?)
}
