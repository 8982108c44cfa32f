//! Synchronization targets and sync requests
//!
//! A [`TargetKey`] identifies one synchronization destination: the source
//! repository project plus the remote domain and project. Persisted state,
//! the sync lock and the sync-run audit are all keyed by it.

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Identifies one synchronization destination
///
/// Domain and project are stored trimmed; they keep their original case
/// because the remote system displays them, but [`TargetKey::binding_key`]
/// gives the case-insensitive form used for session project bindings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetKey {
    source_project_id: u64,
    domain: String,
    project: String,
}

impl TargetKey {
    /// Creates a target key, rejecting a blank domain or project
    pub fn new(
        source_project_id: u64,
        domain: impl AsRef<str>,
        project: impl AsRef<str>,
    ) -> Result<Self, DomainError> {
        let domain = domain.as_ref().trim();
        let project = project.as_ref().trim();

        if domain.is_empty() {
            return Err(DomainError::InvalidTarget(
                "domain must not be blank".to_string(),
            ));
        }
        if project.is_empty() {
            return Err(DomainError::InvalidTarget(
                "project must not be blank".to_string(),
            ));
        }

        Ok(Self {
            source_project_id,
            domain: domain.to_string(),
            project: project.to_string(),
        })
    }

    pub fn source_project_id(&self) -> u64 {
        self.source_project_id
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// Case-insensitive `domain/project` key
    pub fn binding_key(&self) -> String {
        binding_key(&self.domain, &self.project)
    }
}

/// Builds the case-insensitive `domain/project` key used for project bindings
pub fn binding_key(domain: &str, project: &str) -> String {
    format!("{}/{}", domain.trim(), project.trim()).to_lowercase()
}

impl std::fmt::Display for TargetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}/{}",
            self.source_project_id, self.domain, self.project
        )
    }
}

/// One request to mirror a repository ref into a target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    target: TargetKey,
    git_ref: String,
}

impl SyncRequest {
    /// Validates and builds a sync request
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidRef`] for a blank ref and
    /// [`DomainError::InvalidTarget`] for a blank domain or project.
    pub fn new(
        source_project_id: u64,
        git_ref: impl AsRef<str>,
        domain: impl AsRef<str>,
        project: impl AsRef<str>,
    ) -> Result<Self, DomainError> {
        let git_ref = git_ref.as_ref().trim();
        if git_ref.is_empty() {
            return Err(DomainError::InvalidRef(
                "ref (branch, tag or commit) must not be blank".to_string(),
            ));
        }
        let target = TargetKey::new(source_project_id, domain, project)?;
        Ok(Self {
            target,
            git_ref: git_ref.to_string(),
        })
    }

    pub fn target(&self) -> &TargetKey {
        &self.target
    }

    pub fn git_ref(&self) -> &str {
        &self.git_ref
    }
}
