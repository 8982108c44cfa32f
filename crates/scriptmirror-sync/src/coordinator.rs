//! Sync coordinator - the single `sync` entry point
//!
//! One sync request runs these gates in order:
//!
//! 1. Validate the request (blank ref, domain or project is rejected)
//! 2. Take the per-target lock; a held lock fails fast with no remote call
//! 3. Log in if needed and bind the session to the remote project
//! 4. Scan the repository and load the previous inventory
//! 5. Initial mode (no previous inventory): upload everything and persist
//!    the successes. Incremental mode: analyze, apply uploads and deletes,
//!    reconcile and persist.
//!
//! Any phase failure becomes a report with one synthetic FAILED record, so
//! callers always get a [`SyncReport`]. The lock is held by a guard: normal
//! returns release it in line, and a dropped or panicking sync releases it
//! from a background task. Each validated request that completes leaves a
//! sync-run audit row.
//!
//! Units whose version could not be resolved during the scan keep their
//! previous inventory entry for this cycle, so they are never deleted
//! because of a failed lookup.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use scriptmirror_core::domain::{
    ChangeRecord, Inventory, SyncFailure, SyncPhase, SyncReport, SyncRequest, SyncRun, TargetKey,
};
use scriptmirror_core::ports::IStateStore;

use crate::analyzer::{analyze, dedupe_by_path};
use crate::applier::RemoteApplier;
use crate::reconciler::reconcile;
use crate::scanner::{RepositoryScanner, ScanOutcome};
use crate::session::SessionGuard;

/// Display name of phase-failure records for requests without a project
const FALLBACK_DISPLAY_NAME: &str = "SYNC";

/// Orchestrates one sync cycle per request
pub struct SyncCoordinator {
    store: Arc<dyn IStateStore + Send + Sync>,
    session: Arc<SessionGuard>,
    scanner: RepositoryScanner,
    applier: RemoteApplier,
    cancel: CancellationToken,
}

impl SyncCoordinator {
    pub fn new(
        store: Arc<dyn IStateStore + Send + Sync>,
        session: Arc<SessionGuard>,
        scanner: RepositoryScanner,
        applier: RemoteApplier,
    ) -> Self {
        Self {
            store,
            session,
            scanner,
            applier,
            cancel: CancellationToken::new(),
        }
    }

    /// The session guard shared with other callers
    pub fn session(&self) -> &Arc<SessionGuard> {
        &self.session
    }

    /// Token that stops the repository scan of the running and every later
    /// sync of this coordinator
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Mirrors `git_ref` of `source_project_id` into `domain`/`project`
    #[tracing::instrument(skip(self))]
    pub async fn sync(
        &self,
        source_project_id: u64,
        git_ref: &str,
        domain: &str,
        project: &str,
    ) -> SyncReport {
        match SyncRequest::new(source_project_id, git_ref, domain, project) {
            Ok(request) => self.sync_request(&request).await,
            Err(e) => {
                let failure = SyncFailure::InvalidRequest(e);
                warn!(error = %failure, "Rejected sync request");
                let display_name = match project.trim() {
                    "" => FALLBACK_DISPLAY_NAME,
                    name => name,
                };
                SyncReport::phase_failure(failure.phase(), failure.to_string(), display_name)
            }
        }
    }

    /// Runs a validated sync request
    pub async fn sync_request(&self, request: &SyncRequest) -> SyncReport {
        let started_at = Utc::now();
        let report = self.run_locked(request).await;
        self.record_run(request, started_at, &report).await;
        report
    }

    async fn run_locked(&self, request: &SyncRequest) -> SyncReport {
        let target = request.target();

        let lock = match self.store.acquire_lock(target).await {
            Ok(true) => LockGuard::new(self.store.clone(), target.clone()),
            Ok(false) => {
                let failure = SyncFailure::LockContention {
                    target: target.to_string(),
                };
                warn!(target = %target, "Sync already in progress, rejecting request");
                return failure_report(&failure, target);
            }
            Err(e) => {
                error!(target = %target, error = %e, "Failed to acquire sync lock");
                return SyncReport::phase_failure(
                    SyncPhase::Lock,
                    format!("Failed to acquire sync lock for {}: {:#}", target, e),
                    target.project(),
                );
            }
        };

        let report = match self.run_cycle(request).await {
            Ok(report) => report,
            Err(failure) => {
                error!(target = %target, phase = %failure.phase(), error = %failure, "Sync failed");
                failure_report(&failure, target)
            }
        };

        lock.release().await;
        report
    }

    async fn run_cycle(&self, request: &SyncRequest) -> Result<SyncReport, SyncFailure> {
        let target = request.target();

        if self.session.ensure_logged_in().await? {
            self.session.clear_all_bindings();
        }
        self.session
            .ensure_project_bound(target.domain(), target.project())
            .await?;

        let scan = self
            .scanner
            .scan_with_cancel(target.source_project_id(), request.git_ref(), &self.cancel)
            .await?;
        let previous = self.store.load(target).await.map_err(|e| {
            SyncFailure::PersistenceFailure(format!("Failed to load previous inventory: {:#}", e))
        })?;
        let current = carry_forward_unresolved(&previous, scan);

        if previous.is_empty() {
            self.initial_sync(target, &current).await
        } else {
            self.incremental_sync(target, &previous, &current).await
        }
    }

    async fn initial_sync(
        &self,
        target: &TargetKey,
        current: &Inventory,
    ) -> Result<SyncReport, SyncFailure> {
        let entries: Vec<_> = dedupe_by_path(current, "current")
            .into_iter()
            .cloned()
            .collect();
        info!(target = %target, units = entries.len(), "Initial sync: uploading every unit");

        let records = self.applier.apply_uploads(target, &entries).await;

        let uploaded: Inventory = entries
            .iter()
            .zip(records.iter())
            .filter(|(_, record)| record.is_success())
            .map(|(entry, record)| entry.clone().with_remote_object_id(record.remote_object_id))
            .collect();

        if uploaded.is_empty() {
            warn!(target = %target, "No unit uploaded, state not saved");
        } else {
            self.save(target, &uploaded).await?;
        }

        let (successful, failed): (Vec<ChangeRecord>, Vec<ChangeRecord>) =
            records.into_iter().partition(ChangeRecord::is_success);
        info!(
            target = %target,
            uploaded = successful.len(),
            failed = failed.len(),
            "Initial sync finished"
        );
        Ok(SyncReport::initial(successful, failed))
    }

    async fn incremental_sync(
        &self,
        target: &TargetKey,
        previous: &Inventory,
        current: &Inventory,
    ) -> Result<SyncReport, SyncFailure> {
        let changes = analyze(previous, current);
        let unchanged: Vec<ChangeRecord> = changes
            .unchanged
            .iter()
            .map(ChangeRecord::unchanged)
            .collect();

        if changes.has_no_changes() {
            info!(target = %target, unchanged = unchanged.len(), "No changes detected");
            return Ok(SyncReport::no_changes(unchanged));
        }

        info!(
            target = %target,
            to_upload = changes.to_upload.len(),
            to_delete = changes.to_delete.len(),
            unchanged = changes.unchanged.len(),
            "Incremental sync"
        );

        let upload_records = self.applier.apply_uploads(target, &changes.to_upload).await;
        let delete_records = self.applier.apply_deletes(target, &changes.to_delete).await;

        let next = reconcile(previous, &changes, &upload_records, &delete_records);
        self.save(target, &next).await?;

        let (uploaded, mut failed): (Vec<ChangeRecord>, Vec<ChangeRecord>) =
            upload_records.into_iter().partition(ChangeRecord::is_success);
        let (deleted, failed_deletes): (Vec<ChangeRecord>, Vec<ChangeRecord>) =
            delete_records.into_iter().partition(ChangeRecord::is_success);
        failed.extend(failed_deletes);

        info!(
            target = %target,
            uploaded = uploaded.len(),
            deleted = deleted.len(),
            unchanged = unchanged.len(),
            failed = failed.len(),
            "Incremental sync finished"
        );
        Ok(SyncReport::incremental(uploaded, deleted, unchanged, failed))
    }

    async fn save(&self, target: &TargetKey, inventory: &Inventory) -> Result<(), SyncFailure> {
        self.store.save(target, inventory).await.map_err(|e| {
            SyncFailure::PersistenceFailure(format!("Failed to save inventory for {}: {:#}", target, e))
        })
    }

    async fn record_run(
        &self,
        request: &SyncRequest,
        started_at: chrono::DateTime<Utc>,
        report: &SyncReport,
    ) {
        let run = SyncRun {
            run_id: Uuid::new_v4().to_string(),
            target: request.target().clone(),
            git_ref: request.git_ref().to_string(),
            started_at,
            finished_at: Utc::now(),
            success: report.success,
            summary: report.summary,
        };
        if let Err(e) = self.store.record_run(&run).await {
            warn!(run_id = %run.run_id, error = %e, "Failed to record sync run");
        }
    }
}

fn failure_report(failure: &SyncFailure, target: &TargetKey) -> SyncReport {
    SyncReport::phase_failure(failure.phase(), failure.to_string(), target.project())
}

/// Current inventory with the previous entry of every unresolved unit
fn carry_forward_unresolved(previous: &Inventory, scan: ScanOutcome) -> Inventory {
    let ScanOutcome {
        mut inventory,
        unresolved,
    } = scan;

    for path in unresolved {
        if inventory.contains(&path) {
            continue;
        }
        match previous.get(&path) {
            Some(entry) => {
                warn!(unit = %path, "Version unresolved, keeping previous entry for this cycle");
                inventory.push(entry.clone());
            }
            None => debug!(unit = %path, "Version unresolved for a new unit, skipping it"),
        }
    }
    inventory
}

// ============================================================================
// Lock guard
// ============================================================================

/// Per-target sync lock held for the duration of one cycle
///
/// [`release`](Self::release) frees the lock in line. Dropping the guard
/// without releasing (the sync future was dropped or panicked) hands the
/// release to a background task on the current runtime.
struct LockGuard {
    store: Arc<dyn IStateStore + Send + Sync>,
    target: TargetKey,
    released: bool,
}

impl LockGuard {
    fn new(store: Arc<dyn IStateStore + Send + Sync>, target: TargetKey) -> Self {
        Self {
            store,
            target,
            released: false,
        }
    }

    async fn release(mut self) {
        let result = self.store.release_lock(&self.target).await;
        self.released = true;
        if let Err(e) = result {
            error!(target = %self.target, error = %e, "Failed to release sync lock");
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let store = self.store.clone();
        let target = self.target.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(target = %target, "Sync interrupted, releasing lock in the background");
                handle.spawn(async move {
                    if let Err(e) = store.release_lock(&target).await {
                        error!(target = %target, error = %e, "Failed to release sync lock");
                    }
                });
            }
            Err(_) => {
                error!(target = %target, "Sync interrupted outside a runtime, lock left held");
            }
        }
    }
}
