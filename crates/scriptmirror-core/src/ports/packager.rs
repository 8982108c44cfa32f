//! Script packaging port
//!
//! Prepares the upload archive of one unit in a private temporary
//! directory. The caller hands the returned [`PackagedUnit`] back to
//! [`IScriptPackager::cleanup`] once the upload finished, whatever the
//! outcome. A unit dropped without cleanup (e.g. an aborted upload) still
//! removes its directory when the [`TempDir`] handle goes away.

use std::path::PathBuf;

use tempfile::TempDir;

use crate::domain::InventoryEntry;

/// A packaged unit ready for upload
#[derive(Debug)]
pub struct PackagedUnit {
    /// Archive to upload
    pub archive_path: PathBuf,
    /// Directory owning every temporary artifact for this unit
    pub temp_dir: TempDir,
}

#[async_trait::async_trait]
pub trait IScriptPackager: Send + Sync {
    /// Downloads and packages `entry` at its version stamp
    ///
    /// On error, no temporary artifacts are left behind.
    async fn package(&self, source_project_id: u64, entry: &InventoryEntry)
        -> anyhow::Result<PackagedUnit>;

    /// Removes every temporary artifact of a packaged unit
    async fn cleanup(&self, unit: PackagedUnit);
}
