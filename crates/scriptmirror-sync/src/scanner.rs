//! Repository scanner
//!
//! Builds the current inventory in two phases:
//!
//! 1. Walk the recursive tree page by page (a short page ends the walk) and
//!    collect the parent directory of every `*.usr` blob.
//! 2. Resolve the latest version stamp of each unit on a bounded pool of
//!    tasks. A unit whose lookup fails or yields no stamp is left out of
//!    the inventory and reported as unresolved, so callers can tell it
//!    apart from a unit that disappeared from the tree.
//!
//! The task pool belongs to one `scan` call and is always drained before
//! it returns. On cancellation the scanner stops handing out permits,
//! waits up to the shutdown timeout for running lookups, then aborts the
//! rest.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use scriptmirror_core::config::SourceConfig;
use scriptmirror_core::domain::paths::{unit_dir_of_marker, UNIT_MARKER_SUFFIX};
use scriptmirror_core::domain::{Inventory, InventoryEntry, RemoteCallError, SyncFailure};
use scriptmirror_core::ports::{ISourceRepository, VersionStamp};

/// Outcome of one version lookup; `None` when the task never got a permit
type Lookup = (usize, String, Option<Result<Option<VersionStamp>, RemoteCallError>>);

/// Result of one repository scan
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Units with a resolved version stamp, in tree order
    pub inventory: Inventory,
    /// Units present in the tree whose version could not be resolved
    pub unresolved: Vec<String>,
}

/// Scans the source repository for script units
pub struct RepositoryScanner {
    source: Arc<dyn ISourceRepository + Send + Sync>,
    per_page: u32,
    concurrency: usize,
    shutdown_timeout: Duration,
}

impl RepositoryScanner {
    pub fn new(
        source: Arc<dyn ISourceRepository + Send + Sync>,
        per_page: u32,
        concurrency: usize,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            source,
            per_page: per_page.max(1),
            concurrency: concurrency.max(1),
            shutdown_timeout,
        }
    }

    /// Creates a scanner from the `source` configuration section
    pub fn from_config(source: Arc<dyn ISourceRepository + Send + Sync>, config: &SourceConfig) -> Self {
        Self::new(
            source,
            config.per_page,
            config.scan_concurrency,
            config.scan_shutdown_timeout(),
        )
    }

    /// Scans `git_ref` of project `source_project_id`
    pub async fn scan(&self, source_project_id: u64, git_ref: &str) -> Result<ScanOutcome, SyncFailure> {
        self.scan_with_cancel(source_project_id, git_ref, &CancellationToken::new())
            .await
    }

    /// Like [`scan`](Self::scan), stopping early when `cancel` fires
    ///
    /// # Errors
    ///
    /// Returns [`SyncFailure::ScanFailure`] when the tree cannot be listed
    /// or the scan is cancelled.
    pub async fn scan_with_cancel(
        &self,
        source_project_id: u64,
        git_ref: &str,
        cancel: &CancellationToken,
    ) -> Result<ScanOutcome, SyncFailure> {
        let units = self.list_units(source_project_id, git_ref, cancel).await?;
        info!(
            project_id = source_project_id,
            git_ref,
            units = units.len(),
            "Repository tree scanned"
        );

        let outcome = self
            .resolve_versions(source_project_id, git_ref, units, cancel)
            .await?;
        if outcome.unresolved.is_empty() {
            info!(
                project_id = source_project_id,
                entries = outcome.inventory.len(),
                "Current inventory built"
            );
        } else {
            warn!(
                project_id = source_project_id,
                entries = outcome.inventory.len(),
                unresolved = outcome.unresolved.len(),
                "Current inventory built with unresolved units"
            );
        }
        Ok(outcome)
    }

    async fn list_units(
        &self,
        source_project_id: u64,
        git_ref: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, SyncFailure> {
        let mut units = Vec::new();
        let mut seen = HashSet::new();
        let mut page = 1;

        loop {
            if cancel.is_cancelled() {
                return Err(SyncFailure::ScanFailure("scan cancelled".to_string()));
            }

            let items = self
                .source
                .list_tree(source_project_id, git_ref, page, self.per_page)
                .await
                .map_err(|e| SyncFailure::ScanFailure(e.to_string()))?;
            let count = items.len();

            for item in items
                .iter()
                .filter(|item| item.is_blob() && item.name.ends_with(UNIT_MARKER_SUFFIX))
            {
                match unit_dir_of_marker(&item.path) {
                    Some(dir) => {
                        if seen.insert(dir.to_string()) {
                            units.push(dir.to_string());
                        }
                    }
                    None => debug!(path = %item.path, "Skipping unit marker at repository root"),
                }
            }

            debug!(page, count, "Tree page processed");
            if count < self.per_page as usize {
                break;
            }
            page += 1;
        }

        Ok(units)
    }

    async fn resolve_versions(
        &self,
        source_project_id: u64,
        git_ref: &str,
        units: Vec<String>,
        cancel: &CancellationToken,
    ) -> Result<ScanOutcome, SyncFailure> {
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks: JoinSet<Lookup> = JoinSet::new();

        for (index, unit) in units.iter().cloned().enumerate() {
            let source = self.source.clone();
            let permits = permits.clone();
            let git_ref = git_ref.to_string();
            tasks.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return (index, unit, None);
                };
                let outcome = source
                    .latest_version(source_project_id, &git_ref, &unit)
                    .await;
                (index, unit, Some(outcome))
            });
        }

        let mut resolved: Vec<Option<InventoryEntry>> =
            std::iter::repeat_with(|| None).take(units.len()).collect();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    permits.close();
                    self.shutdown(&mut tasks).await;
                    return Err(SyncFailure::ScanFailure("scan cancelled".to_string()));
                }
                next = tasks.join_next() => match next {
                    None => break,
                    Some(Ok((index, unit, Some(Ok(Some(stamp)))))) if !stamp.is_empty() => {
                        resolved[index] = Some(InventoryEntry::new(unit, stamp.sha, stamp.committed_at));
                    }
                    Some(Ok((_, unit, Some(Ok(_))))) => {
                        warn!(unit = %unit, "No version found for unit, omitting it from this scan");
                    }
                    Some(Ok((_, unit, Some(Err(e))))) => {
                        warn!(unit = %unit, error = %e, "Version lookup failed, omitting unit from this scan");
                    }
                    Some(Ok((_, unit, None))) => {
                        debug!(unit = %unit, "Version lookup skipped");
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Version lookup task failed");
                    }
                }
            }
        }

        let mut outcome = ScanOutcome::default();
        for (unit, entry) in units.into_iter().zip(resolved) {
            match entry {
                Some(entry) => outcome.inventory.push(entry),
                None => outcome.unresolved.push(unit),
            }
        }
        Ok(outcome)
    }

    /// Waits for running lookups, aborting whatever outlives the timeout
    async fn shutdown(&self, tasks: &mut JoinSet<Lookup>) {
        let drained = tokio::time::timeout(self.shutdown_timeout, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(
                remaining = tasks.len(),
                timeout_secs = self.shutdown_timeout.as_secs(),
                "Version lookups did not finish in time, aborting"
            );
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }
    }
}
