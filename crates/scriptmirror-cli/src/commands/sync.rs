//! Sync command - Mirror one repository ref into a remote project
//!
//! Provides the `scriptmirror sync` CLI command which:
//! 1. Wires the repository, remote server and state store adapters
//! 2. Runs one sync cycle for the requested target (Ctrl-C stops the
//!    repository scan and still releases the lock)
//! 3. Prints the report and exits non-zero when anything failed

use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Args;
use tracing::{info, warn};

use scriptmirror_core::config::Config;
use scriptmirror_core::domain::{ChangeAction, ChangeRecord, SyncReport, SyncSummary};
use scriptmirror_sync::{
    RemoteApplier, RepositoryScanner, ScriptPackager, SessionGuard, SyncCoordinator,
};

use super::{ensure_valid, open_store, script_server, source_repository, TargetArgs};
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct SyncCommand {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Branch, tag or commit to mirror
    #[arg(long = "ref")]
    pub git_ref: String,
}

impl SyncCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        ensure_valid(config)?;
        let formatter = get_formatter(format);

        let store = Arc::new(open_store(config).await?);
        let source = source_repository(config)?;
        let remote = script_server(config)?;

        let session = Arc::new(SessionGuard::from_config(remote.clone(), &config.remote));
        let packager = Arc::new(ScriptPackager::new(
            source.clone(),
            config.packaging.work_dir.clone(),
        ));
        let coordinator = SyncCoordinator::new(
            store,
            session.clone(),
            RepositoryScanner::from_config(source, &config.source),
            RemoteApplier::new(remote, packager),
        );

        formatter.info(&format!(
            "Syncing {} of project {} into {}/{}...",
            self.git_ref, self.target.project_id, self.target.domain, self.target.project
        ));
        info!(
            project_id = self.target.project_id,
            git_ref = %self.git_ref,
            "Sync requested from CLI"
        );

        let cancel = coordinator.cancellation_token();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling the repository scan");
                cancel.cancel();
            }
        });

        let report = coordinator
            .sync(
                self.target.project_id,
                &self.git_ref,
                &self.target.domain,
                &self.target.project,
            )
            .await;
        interrupt.abort();

        session.logout().await;

        print_report(formatter.as_ref(), format, &report)?;

        if !report.success {
            bail!("Sync finished with {} failed record(s)", report.summary.failed);
        }
        Ok(())
    }
}

fn print_report(
    formatter: &dyn OutputFormatter,
    format: OutputFormat,
    report: &SyncReport,
) -> Result<()> {
    if format.is_json() {
        formatter.print_json(&serde_json::to_value(report)?);
        return Ok(());
    }

    if report.success {
        formatter.success("Sync completed");
    } else {
        formatter.error("Sync completed with failures");
    }
    formatter.info(&summary_line(&report.summary));

    for record in report
        .all_records()
        .filter(|r| r.action != ChangeAction::Unchanged)
    {
        if record.is_failed() {
            formatter.warn(&record_line(record));
        } else {
            formatter.info(&record_line(record));
        }
    }
    Ok(())
}

fn summary_line(summary: &SyncSummary) -> String {
    format!(
        "  Uploaded: {}  Deleted: {}  Unchanged: {}  Failed: {}",
        summary.uploaded, summary.deleted, summary.unchanged, summary.failed
    )
}

fn record_line(record: &ChangeRecord) -> String {
    let status = if record.is_success() { "ok" } else { "FAILED" };
    let mut line = format!(
        "  {:<14} {:<6} {} ({})",
        record.action, status, record.path, record.short_version_stamp
    );
    if let Some(id) = record.remote_object_id {
        line.push_str(&format!(" #{id}"));
    }
    if !record.message.is_empty() {
        line.push_str(" - ");
        line.push_str(&record.message);
    }
    line
}
