//! Script packager - prepares upload archives in private temp directories
//!
//! Each unit gets its own temporary directory (under the configured work
//! dir, or the OS temp dir). The repository archive of the unit at its
//! version stamp is written there as `<name>-<stamp8>.zip`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use tempfile::TempDir;
use tracing::{debug, warn};

use scriptmirror_core::domain::paths::archive_file_name;
use scriptmirror_core::domain::InventoryEntry;
use scriptmirror_core::ports::{IScriptPackager, ISourceRepository, PackagedUnit};

const TEMP_PREFIX: &str = "scriptmirror-";

/// Packages units from the source repository
pub struct ScriptPackager {
    source: Arc<dyn ISourceRepository + Send + Sync>,
    work_dir: Option<PathBuf>,
}

impl ScriptPackager {
    /// Creates a packager writing below `work_dir` (OS temp dir when `None`)
    pub fn new(source: Arc<dyn ISourceRepository + Send + Sync>, work_dir: Option<PathBuf>) -> Self {
        Self { source, work_dir }
    }

    async fn create_temp_dir(&self) -> anyhow::Result<TempDir> {
        let work_dir = self.work_dir.clone();
        tokio::task::spawn_blocking(move || create_temp_dir_in(work_dir.as_deref()))
            .await
            .context("Temporary directory task failed")?
    }

    async fn write_archive(
        &self,
        source_project_id: u64,
        entry: &InventoryEntry,
        temp_dir: &Path,
    ) -> anyhow::Result<PathBuf> {
        if entry.has_blank_stamp() {
            bail!("{} has no version stamp to package", entry.path);
        }

        let bytes = self
            .source
            .download_archive(source_project_id, entry.version_stamp.trim(), &entry.path)
            .await
            .with_context(|| format!("Failed to download archive of {}", entry.path))?;
        if bytes.is_empty() {
            bail!("Archive of {} is empty", entry.path);
        }

        let archive_path = temp_dir.join(archive_file_name(&entry.path, &entry.version_stamp));
        tokio::fs::write(&archive_path, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", archive_path.display()))?;

        let written = tokio::fs::metadata(&archive_path)
            .await
            .with_context(|| format!("Failed to stat {}", archive_path.display()))?;
        if written.len() == 0 {
            bail!("Packaged archive {} is empty", archive_path.display());
        }

        Ok(archive_path)
    }
}

#[async_trait::async_trait]
impl IScriptPackager for ScriptPackager {
    async fn package(
        &self,
        source_project_id: u64,
        entry: &InventoryEntry,
    ) -> anyhow::Result<PackagedUnit> {
        let temp_dir = self.create_temp_dir().await?;

        match self.write_archive(source_project_id, entry, temp_dir.path()).await {
            Ok(archive_path) => {
                debug!(path = %entry.path, archive = %archive_path.display(), "Unit packaged");
                Ok(PackagedUnit {
                    archive_path,
                    temp_dir,
                })
            }
            Err(e) => {
                remove_dir(temp_dir).await;
                Err(e)
            }
        }
    }

    async fn cleanup(&self, unit: PackagedUnit) {
        remove_dir(unit.temp_dir).await;
    }
}

fn create_temp_dir_in(work_dir: Option<&Path>) -> anyhow::Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(TEMP_PREFIX);
    match work_dir {
        Some(root) => {
            std::fs::create_dir_all(root)
                .with_context(|| format!("Failed to create work dir {}", root.display()))?;
            builder.tempdir_in(root)
        }
        None => builder.tempdir(),
    }
    .context("Failed to create temporary directory")
}

/// Removes `dir` off the async workers
async fn remove_dir(dir: TempDir) {
    let path = dir.path().to_path_buf();
    let outcome = tokio::task::spawn_blocking(move || dir.close()).await;
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            warn!(dir = %path.display(), error = %e, "Failed to remove temporary directory")
        }
        Err(e) => {
            warn!(dir = %path.display(), error = %e, "Temporary directory removal task failed")
        }
    }
}
