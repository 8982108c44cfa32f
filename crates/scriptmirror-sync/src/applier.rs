//! Remote applier - uploads and deletes with per-item failure isolation
//!
//! Every item of a batch gets exactly one [`ChangeRecord`]. A failing item
//! is recorded as FAILED (message capped at 200 characters) and the batch
//! moves on; nothing in here returns an error.
//!
//! Uploads read the remote folder taxonomy once per batch. Missing folders
//! are created segment by segment and remembered, so later items of the
//! same batch do not create them again.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use scriptmirror_core::domain::paths::{truncate_message, SUBJECT_ROOT};
use scriptmirror_core::domain::{
    ChangeAction, ChangeRecord, InventoryEntry, RemoteCallError, SyncFailure, TargetKey,
    UnitLocation,
};
use scriptmirror_core::ports::{IRemoteScriptSystem, IScriptPackager, RemoteFolder, RemoteUnit};

// ============================================================================
// Folder taxonomy
// ============================================================================

/// Known remote folders, compared case-insensitively by full path
#[derive(Debug, Default)]
struct FolderIndex {
    known: HashSet<String>,
}

impl FolderIndex {
    fn new(folders: &[RemoteFolder]) -> Self {
        let mut index = Self::default();
        for folder in folders {
            index.remember(&folder.full_path);
        }
        index
    }

    fn contains(&self, path: &str) -> bool {
        self.known.contains(&path.to_lowercase())
    }

    fn remember(&mut self, path: &str) {
        if !path.is_empty() {
            self.known.insert(path.to_lowercase());
        }
    }

    /// Creates the missing segments of `folder_path` below `Subject`, in order
    async fn ensure(
        &mut self,
        remote: &dyn IRemoteScriptSystem,
        target: &TargetKey,
        folder_path: &str,
    ) -> Result<(), RemoteCallError> {
        let mut segments = folder_path.split('\\').filter(|s| !s.is_empty());
        let mut current = segments.next().unwrap_or(SUBJECT_ROOT).to_string();

        for segment in segments {
            let candidate = format!("{}\\{}", current, segment);
            if !self.contains(&candidate) {
                let created = remote
                    .create_folder(target.domain(), target.project(), &current, segment)
                    .await?;
                debug!(path = %candidate, id = created.id, "Created remote folder");
                self.remember(&created.full_path);
                self.remember(&candidate);
            }
            current = candidate;
        }
        Ok(())
    }
}

// ============================================================================
// RemoteApplier
// ============================================================================

/// Applies upload and delete batches to the remote script server
pub struct RemoteApplier {
    remote: Arc<dyn IRemoteScriptSystem + Send + Sync>,
    packager: Arc<dyn IScriptPackager + Send + Sync>,
}

impl RemoteApplier {
    pub fn new(
        remote: Arc<dyn IRemoteScriptSystem + Send + Sync>,
        packager: Arc<dyn IScriptPackager + Send + Sync>,
    ) -> Self {
        Self { remote, packager }
    }

    /// Uploads every entry, returning one record per entry in input order
    pub async fn apply_uploads(
        &self,
        target: &TargetKey,
        entries: &[InventoryEntry],
    ) -> Vec<ChangeRecord> {
        if entries.is_empty() {
            return Vec::new();
        }

        let mut folders = match self
            .remote
            .list_folders(target.domain(), target.project())
            .await
        {
            Ok(folders) => FolderIndex::new(&folders),
            Err(e) => {
                warn!(target = %target, error = %e, "Failed to read remote folder taxonomy");
                let message = truncate_message(&format!("Failed to list remote folders: {}", e));
                let records: Vec<ChangeRecord> = entries
                    .iter()
                    .map(|entry| ChangeRecord::failure(entry, ChangeAction::Upload, message.clone()))
                    .collect();
                log_batch_summary("Upload", &records);
                return records;
            }
        };

        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            let record = match self.upload_one(target, entry, &mut folders).await {
                Ok(unit) => ChangeRecord::success(entry, ChangeAction::Upload, Some(unit.id)),
                Err(failure) => {
                    ChangeRecord::failure(entry, ChangeAction::Upload, truncate_message(&failure.to_string()))
                }
            };
            records.push(record);
        }

        log_batch_summary("Upload", &records);
        records
    }

    async fn upload_one(
        &self,
        target: &TargetKey,
        entry: &InventoryEntry,
        folders: &mut FolderIndex,
    ) -> Result<RemoteUnit, SyncFailure> {
        let item_failure = |reason: String| SyncFailure::RemoteItemFailure {
            path: entry.path.clone(),
            reason,
        };

        let package = self
            .packager
            .package(target.source_project_id(), entry)
            .await
            .map_err(|e| item_failure(format!("packaging failed: {:#}", e)))?;

        let folder_path = UnitLocation::from_repo_path(&entry.path).remote_folder_path();
        let outcome = async {
            folders
                .ensure(self.remote.as_ref(), target, &folder_path)
                .await?;
            self.remote
                .upload_unit(
                    target.domain(),
                    target.project(),
                    &folder_path,
                    &package.archive_path,
                )
                .await
        }
        .await;

        self.packager.cleanup(package).await;

        outcome.map_err(|e| item_failure(e.to_string()))
    }

    /// Deletes every entry by its persisted remote id
    ///
    /// Entries without a remote id cannot be resolved and are recorded as
    /// failed, which keeps them in the persisted inventory.
    pub async fn apply_deletes(
        &self,
        target: &TargetKey,
        entries: &[InventoryEntry],
    ) -> Vec<ChangeRecord> {
        if entries.is_empty() {
            return Vec::new();
        }

        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            let record = match entry.remote_object_id {
                None => ChangeRecord::failure(
                    entry,
                    ChangeAction::Delete,
                    format!("No remote object id recorded for {}", entry.path),
                ),
                Some(id) => match self
                    .remote
                    .delete_unit(target.domain(), target.project(), id)
                    .await
                {
                    Ok(()) => ChangeRecord::success(entry, ChangeAction::Delete, Some(id)),
                    Err(e) => {
                        let failure = SyncFailure::RemoteItemFailure {
                            path: entry.path.clone(),
                            reason: e.to_string(),
                        };
                        ChangeRecord::failure(
                            entry,
                            ChangeAction::Delete,
                            truncate_message(&failure.to_string()),
                        )
                    }
                },
            };
            records.push(record);
        }

        log_batch_summary("Delete", &records);
        records
    }
}

fn log_batch_summary(kind: &str, records: &[ChangeRecord]) {
    let failed = records.iter().filter(|r| r.is_failed()).count();
    info!(
        "{} batch: {} total, {} succeeded, {} failed",
        kind,
        records.len(),
        records.len() - failed,
        failed
    );
    for record in records.iter().filter(|r| r.is_failed()) {
        warn!(path = %record.path, action = %record.action, message = %record.message, "Item failed");
    }
}
