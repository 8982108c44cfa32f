//! Reconciliation of the persisted inventory after an incremental sync
//!
//! The next snapshot is built from the change set and the per-item
//! outcomes so that a failure never loses track of a unit:
//!
//! - unchanged entries are kept as they are
//! - uploaded entries take the current version and the id from their
//!   record, falling back to the previous id
//! - entries whose upload failed keep their previous version (when there
//!   is one) so the upload is retried next cycle
//! - entries whose delete failed are kept so the delete is retried
//! - successfully deleted paths are removed
//!
//! An item without an outcome record is treated as failed.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use scriptmirror_core::domain::{ChangeRecord, ChangeSet, Inventory, InventoryEntry};

use crate::analyzer::dedupe_by_path;

/// Builds the inventory to persist after applying `changes`
pub fn reconcile(
    previous: &Inventory,
    changes: &ChangeSet,
    upload_records: &[ChangeRecord],
    delete_records: &[ChangeRecord],
) -> Inventory {
    let previous_index: HashMap<&str, &InventoryEntry> = dedupe_by_path(previous, "previous")
        .into_iter()
        .map(|entry| (entry.path.as_str(), entry))
        .collect();
    let uploads = index_records(upload_records);
    let deletes = index_records(delete_records);

    let mut next: Vec<InventoryEntry> = Vec::new();

    next.extend(changes.unchanged.iter().cloned());

    for entry in &changes.to_upload {
        let previous_entry = previous_index.get(entry.path.as_str());
        match uploads.get(entry.path.as_str()) {
            Some(record) if record.is_success() => {
                let remote_id = record
                    .remote_object_id
                    .or_else(|| previous_entry.and_then(|p| p.remote_object_id));
                next.push(entry.clone().with_remote_object_id(remote_id));
            }
            _ => {
                if let Some(previous_entry) = previous_entry {
                    next.push((*previous_entry).clone());
                }
            }
        }
    }

    for entry in &changes.to_delete {
        let deleted = deletes
            .get(entry.path.as_str())
            .is_some_and(|record| record.is_success());
        if !deleted {
            next.push(entry.clone());
        }
    }

    let deleted_paths: HashSet<&str> = delete_records
        .iter()
        .filter(|record| record.is_success())
        .map(|record| record.path.as_str())
        .collect();

    let mut seen = HashSet::new();
    let reconciled: Inventory = next
        .into_iter()
        .filter(|entry| !deleted_paths.contains(entry.path.as_str()))
        .filter(|entry| seen.insert(entry.path.clone()))
        .collect();

    debug!(
        previous = previous.len(),
        next = reconciled.len(),
        "Inventory reconciled"
    );
    reconciled
}

fn index_records(records: &[ChangeRecord]) -> HashMap<&str, &ChangeRecord> {
    let mut index = HashMap::new();
    for record in records {
        index.entry(record.path.as_str()).or_insert(record);
    }
    index
}
