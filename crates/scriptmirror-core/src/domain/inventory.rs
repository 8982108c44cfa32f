//! Tracked script units
//!
//! An [`InventoryEntry`] is one unit (a repository directory holding a
//! script bundle) with the version stamp it was last seen at. An
//! [`Inventory`] is the set of entries for one target, either freshly
//! scanned ("current") or loaded from the state store ("previous").
//!
//! Entries are never mutated in place by a sync cycle; reconciliation
//! builds a new inventory that supersedes the previous one.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// One tracked unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryEntry {
    /// Repository path of the unit directory, unique within a target
    pub path: String,
    /// Content version identifier (commit SHA); may be blank for malformed data
    pub version_stamp: String,
    /// When the version was committed, as reported by the source repository
    pub changed_at: String,
    /// Identifier assigned by the remote system; `None` until first upload
    pub remote_object_id: Option<i64>,
}

impl InventoryEntry {
    /// Creates an entry that has not been uploaded yet
    pub fn new(
        path: impl Into<String>,
        version_stamp: impl Into<String>,
        changed_at: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            version_stamp: version_stamp.into(),
            changed_at: changed_at.into(),
            remote_object_id: None,
        }
    }

    /// Returns a copy carrying the given remote object id
    pub fn with_remote_object_id(mut self, id: Option<i64>) -> Self {
        self.remote_object_id = id;
        self
    }

    /// True when the version stamp is missing or whitespace only
    pub fn has_blank_stamp(&self) -> bool {
        self.version_stamp.trim().is_empty()
    }
}

/// A collection of inventory entries for one target
///
/// Paths are expected to be unique, but a scan can report the same path
/// twice; consumers that index by path keep the first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Inventory {
    entries: Vec<InventoryEntry>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, InventoryEntry> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[InventoryEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<InventoryEntry> {
        self.entries
    }

    pub fn push(&mut self, entry: InventoryEntry) {
        self.entries.push(entry);
    }

    /// Returns the first entry with the given path
    pub fn get(&self, path: &str) -> Option<&InventoryEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Distinct paths in this inventory
    pub fn paths(&self) -> HashSet<&str> {
        self.entries.iter().map(|e| e.path.as_str()).collect()
    }
}

impl From<Vec<InventoryEntry>> for Inventory {
    fn from(entries: Vec<InventoryEntry>) -> Self {
        Self { entries }
    }
}

impl FromIterator<InventoryEntry> for Inventory {
    fn from_iter<I: IntoIterator<Item = InventoryEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Inventory {
    type Item = InventoryEntry;
    type IntoIter = std::vec::IntoIter<InventoryEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Inventory {
    type Item = &'a InventoryEntry;
    type IntoIter = std::slice::Iter<'a, InventoryEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
