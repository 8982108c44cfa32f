//! Change detection output and per-item outcomes

use serde::{Deserialize, Serialize};

use super::errors::SyncPhase;
use super::inventory::InventoryEntry;
use super::paths::{short_stamp, UnitLocation};

/// Output of change analysis
///
/// `to_upload` and `unchanged` together hold every current entry;
/// `to_delete` holds previous entries whose path vanished. The three sets
/// never share a path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Current entries that are new or whose version stamp changed
    pub to_upload: Vec<InventoryEntry>,
    /// Previous entries no longer present in the current inventory
    pub to_delete: Vec<InventoryEntry>,
    /// Current entries whose version stamp matches the previous one
    pub unchanged: Vec<InventoryEntry>,
}

impl ChangeSet {
    /// True when nothing needs to be uploaded or deleted
    pub fn has_no_changes(&self) -> bool {
        self.to_upload.is_empty() && self.to_delete.is_empty()
    }
}

/// What was done (or attempted) for a change record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeAction {
    Upload,
    Delete,
    Unchanged,
    /// Synthetic record for a failure while taking the lock
    Lock,
    /// Synthetic record for a login or project binding failure
    Session,
    /// Synthetic record for any other phase-level failure
    SyncException,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Upload => "UPLOAD",
            ChangeAction::Delete => "DELETE",
            ChangeAction::Unchanged => "UNCHANGED",
            ChangeAction::Lock => "LOCK",
            ChangeAction::Session => "SESSION",
            ChangeAction::SyncException => "SYNC_EXCEPTION",
        }
    }
}

impl From<SyncPhase> for ChangeAction {
    fn from(phase: SyncPhase) -> Self {
        match phase {
            SyncPhase::Lock => ChangeAction::Lock,
            SyncPhase::Session => ChangeAction::Session,
            SyncPhase::SyncException => ChangeAction::SyncException,
        }
    }
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeStatus {
    Success,
    Failed,
}

/// Outcome of one applied operation
///
/// Immutable once built; one record per applied item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    pub path: String,
    pub display_name: String,
    pub short_version_stamp: String,
    pub action: ChangeAction,
    pub status: ChangeStatus,
    pub message: String,
    pub remote_folder_path: String,
    pub remote_object_id: Option<i64>,
}

impl ChangeRecord {
    /// Successful upload or delete of `entry`
    pub fn success(entry: &InventoryEntry, action: ChangeAction, remote_id: Option<i64>) -> Self {
        let location = UnitLocation::from_repo_path(&entry.path);
        Self {
            path: entry.path.clone(),
            display_name: location.name.clone(),
            short_version_stamp: short_stamp(&entry.version_stamp),
            action,
            status: ChangeStatus::Success,
            message: format!("{} successfully", action.as_str()),
            remote_folder_path: location.remote_folder_path(),
            remote_object_id: remote_id,
        }
    }

    /// Failed upload or delete of `entry`
    pub fn failure(entry: &InventoryEntry, action: ChangeAction, message: impl Into<String>) -> Self {
        let location = UnitLocation::from_repo_path(&entry.path);
        Self {
            path: entry.path.clone(),
            display_name: location.name.clone(),
            short_version_stamp: short_stamp(&entry.version_stamp),
            action,
            status: ChangeStatus::Failed,
            message: message.into(),
            remote_folder_path: location.remote_folder_path(),
            remote_object_id: None,
        }
    }

    /// Entry that needed no remote operation
    pub fn unchanged(entry: &InventoryEntry) -> Self {
        let location = UnitLocation::from_repo_path(&entry.path);
        Self {
            path: entry.path.clone(),
            display_name: location.name.clone(),
            short_version_stamp: short_stamp(&entry.version_stamp),
            action: ChangeAction::Unchanged,
            status: ChangeStatus::Success,
            message: "No changes detected".to_string(),
            remote_folder_path: location.remote_folder_path(),
            remote_object_id: entry.remote_object_id,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ChangeStatus::Success
    }

    pub fn is_failed(&self) -> bool {
        self.status == ChangeStatus::Failed
    }
}
