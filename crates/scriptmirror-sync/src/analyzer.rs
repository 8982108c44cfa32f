//! Change analysis between a persisted and a freshly scanned inventory
//!
//! [`analyze`] is pure: no I/O, no clock, and the output only depends on
//! the two inventories. Both inventories are indexed by path with the first
//! occurrence winning; later duplicates are dropped with a warning.
//!
//! ## Classification
//!
//! | Previous | Current | Stamps                  | Result      |
//! |----------|---------|-------------------------|-------------|
//! | absent   | present | -                       | `to_upload` |
//! | present  | present | equal, or both blank    | `unchanged` |
//! | present  | present | differ, or one blank    | `to_upload` |
//! | present  | absent  | -                       | `to_delete` |
//!
//! Unchanged entries inherit the remote object id of their previous entry
//! when the scan did not provide one, so the id survives into the next
//! persisted snapshot.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use scriptmirror_core::domain::{ChangeSet, Inventory, InventoryEntry};

/// Compares `previous` against `current`
pub fn analyze(previous: &Inventory, current: &Inventory) -> ChangeSet {
    let previous_entries = dedupe_by_path(previous, "previous");
    let current_entries = dedupe_by_path(current, "current");

    let previous_index: HashMap<&str, &InventoryEntry> = previous_entries
        .iter()
        .map(|entry| (entry.path.as_str(), *entry))
        .collect();
    let current_paths: HashSet<&str> = current_entries
        .iter()
        .map(|entry| entry.path.as_str())
        .collect();

    let mut changes = ChangeSet::default();

    for entry in &previous_entries {
        if !current_paths.contains(entry.path.as_str()) {
            changes.to_delete.push((*entry).clone());
        }
    }

    for entry in &current_entries {
        match previous_index.get(entry.path.as_str()) {
            Some(previous) if !stamp_changed(previous, entry) => {
                let remote_id = entry.remote_object_id.or(previous.remote_object_id);
                changes
                    .unchanged
                    .push((*entry).clone().with_remote_object_id(remote_id));
            }
            _ => changes.to_upload.push((*entry).clone()),
        }
    }

    debug!(
        to_upload = changes.to_upload.len(),
        to_delete = changes.to_delete.len(),
        unchanged = changes.unchanged.len(),
        "Change analysis complete"
    );
    changes
}

/// Entries of `inventory` with repeated paths dropped (first occurrence wins)
pub fn dedupe_by_path<'a>(inventory: &'a Inventory, label: &str) -> Vec<&'a InventoryEntry> {
    let mut seen = HashSet::new();
    inventory
        .iter()
        .filter(|entry| {
            let first = seen.insert(entry.path.as_str());
            if !first {
                warn!(
                    path = %entry.path,
                    inventory = label,
                    "Duplicate path in inventory, keeping first occurrence"
                );
            }
            first
        })
        .collect()
}

/// A blank stamp on exactly one side counts as a change
fn stamp_changed(previous: &InventoryEntry, current: &InventoryEntry) -> bool {
    match (previous.has_blank_stamp(), current.has_blank_stamp()) {
        (true, true) => false,
        (false, false) => previous.version_stamp.trim() != current.version_stamp.trim(),
        _ => true,
    }
}
