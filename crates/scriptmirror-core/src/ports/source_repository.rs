//! Source repository port (driven/secondary port)
//!
//! Read-only access to the repository holding the script units: a
//! paginated recursive tree listing, the latest commit touching a path,
//! and a path-scoped archive download.

use serde::{Deserialize, Serialize};

use crate::domain::RemoteCallError;

/// Kind of a repository tree entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeItemKind {
    Tree,
    Blob,
    /// Submodule commits and anything else the repository reports
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeItem {
    pub name: String,
    pub path: String,
    pub kind: TreeItemKind,
}

impl TreeItem {
    pub fn is_blob(&self) -> bool {
        self.kind == TreeItemKind::Blob
    }
}

/// Latest version of a path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionStamp {
    pub sha: String,
    pub committed_at: String,
}

impl VersionStamp {
    /// True when both the SHA and the commit date are blank
    pub fn is_empty(&self) -> bool {
        self.sha.trim().is_empty() && self.committed_at.trim().is_empty()
    }
}

#[async_trait::async_trait]
pub trait ISourceRepository: Send + Sync {
    /// One page (1-based) of the recursive tree at `git_ref`
    async fn list_tree(
        &self,
        project_id: u64,
        git_ref: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<TreeItem>, RemoteCallError>;

    /// Latest commit touching `path` at `git_ref`; `None` when there is none
    async fn latest_version(
        &self,
        project_id: u64,
        git_ref: &str,
        path: &str,
    ) -> Result<Option<VersionStamp>, RemoteCallError>;

    /// Archive of `path` at commit `sha`
    async fn download_archive(
        &self,
        project_id: u64,
        sha: &str,
        path: &str,
    ) -> Result<Vec<u8>, RemoteCallError>;
}
