//! History command - Show recent sync runs of a target

use anyhow::Result;
use clap::Args;

use scriptmirror_core::config::Config;
use scriptmirror_core::domain::SyncRun;
use scriptmirror_core::ports::IStateStore;

use super::{open_store, TargetArgs};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct HistoryCommand {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Maximum number of runs to show
    #[arg(long, default_value = "20")]
    pub limit: u32,
}

impl HistoryCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let target = self.target.target()?;

        if !config.state.database.exists() {
            formatter.error("No state database found. Run 'scriptmirror sync' first.");
            return Ok(());
        }

        let store = open_store(config).await?;
        let runs = store.recent_runs(&target, self.limit).await?;

        if format.is_json() {
            formatter.print_json(&serde_json::to_value(&runs)?);
            return Ok(());
        }

        if runs.is_empty() {
            formatter.info(&format!("No sync runs recorded for {target}"));
            return Ok(());
        }

        let rows: Vec<Vec<String>> = runs.iter().map(run_row).collect();
        formatter.table(
            &["STARTED", "RESULT", "REF", "UPLOADED", "DELETED", "UNCHANGED", "FAILED"],
            &rows,
        );
        Ok(())
    }
}

fn run_row(run: &SyncRun) -> Vec<String> {
    vec![
        run.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        if run.success { "ok" } else { "FAILED" }.to_string(),
        run.git_ref.clone(),
        run.summary.uploaded.to_string(),
        run.summary.deleted.to_string(),
        run.summary.unchanged.to_string(),
        run.summary.failed.to_string(),
    ]
}
