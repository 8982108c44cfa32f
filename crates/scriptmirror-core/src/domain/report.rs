//! Sync report - the externally visible result of a sync request
//!
//! ## JSON shape
//!
//! ```json
//! {
//!   "success": true,
//!   "summary": { "uploaded": 1, "deleted": 0, "unchanged": 4, "failed": 0 },
//!   "changes": { "uploaded": [...], "deleted": [], "unchanged": [...], "failed": [] }
//! }
//! ```
//!
//! `success` is always derived from the failed list, so a report can never
//! claim success while carrying failed records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::change::{ChangeAction, ChangeRecord, ChangeStatus};
use super::errors::SyncPhase;
use super::paths::SUBJECT_ROOT;
use super::target::TargetKey;

/// Path used by synthetic phase-failure records
pub const SYSTEM_PATH: &str = "SYSTEM";

/// Counts per outcome category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub uploaded: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub failed: usize,
}

/// Change records grouped by outcome
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorizedChanges {
    pub uploaded: Vec<ChangeRecord>,
    pub deleted: Vec<ChangeRecord>,
    pub unchanged: Vec<ChangeRecord>,
    pub failed: Vec<ChangeRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub success: bool,
    pub summary: SyncSummary,
    pub changes: CategorizedChanges,
}

impl SyncReport {
    fn from_changes(changes: CategorizedChanges) -> Self {
        let summary = SyncSummary {
            uploaded: changes.uploaded.len(),
            deleted: changes.deleted.len(),
            unchanged: changes.unchanged.len(),
            failed: changes.failed.len(),
        };
        Self {
            success: changes.failed.is_empty(),
            summary,
            changes,
        }
    }

    /// Report for an initial sync (uploads only)
    pub fn initial(successful: Vec<ChangeRecord>, failed: Vec<ChangeRecord>) -> Self {
        Self::from_changes(CategorizedChanges {
            uploaded: successful,
            failed,
            ..Default::default()
        })
    }

    /// Report for an incremental sync
    pub fn incremental(
        uploaded: Vec<ChangeRecord>,
        deleted: Vec<ChangeRecord>,
        unchanged: Vec<ChangeRecord>,
        failed: Vec<ChangeRecord>,
    ) -> Self {
        Self::from_changes(CategorizedChanges {
            uploaded,
            deleted,
            unchanged,
            failed,
        })
    }

    /// Successful report where every unit was unchanged
    pub fn no_changes(unchanged: Vec<ChangeRecord>) -> Self {
        Self::from_changes(CategorizedChanges {
            unchanged,
            ..Default::default()
        })
    }

    /// Report holding a single synthetic failed record for a phase failure
    ///
    /// `display_name` is usually the remote project; callers without a valid
    /// target pass a placeholder.
    pub fn phase_failure(phase: SyncPhase, message: impl Into<String>, display_name: &str) -> Self {
        let record = ChangeRecord {
            path: SYSTEM_PATH.to_string(),
            display_name: display_name.to_string(),
            short_version_stamp: "-".to_string(),
            action: ChangeAction::from(phase),
            status: ChangeStatus::Failed,
            message: message.into(),
            remote_folder_path: format!("{}\\", SUBJECT_ROOT),
            remote_object_id: None,
        };
        Self::from_changes(CategorizedChanges {
            failed: vec![record],
            ..Default::default()
        })
    }

    /// Every record in the report, in category order
    pub fn all_records(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.changes
            .uploaded
            .iter()
            .chain(self.changes.deleted.iter())
            .chain(self.changes.unchanged.iter())
            .chain(self.changes.failed.iter())
    }
}

/// Audit row describing one sync attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRun {
    pub run_id: String,
    pub target: TargetKey,
    pub git_ref: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub success: bool,
    pub summary: SyncSummary,
}
