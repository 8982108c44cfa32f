//! Remote script system port (driven/secondary port)
//!
//! The remote system is a stateful, session-authenticated server that holds
//! uploaded script units inside a folder taxonomy rooted at `Subject`.
//!
//! ## Design Notes
//!
//! - Every call returns [`RemoteCallError`] so callers can isolate failures
//!   per item by branching on the variant.
//! - `login` returns `Ok(false)` for rejected credentials; other failures
//!   are errors.
//! - The session is implicit (held by the adapter, e.g. in a cookie jar);
//!   `bind_project` selects the project context for that session.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::RemoteCallError;

/// A unit stored in the remote system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUnit {
    pub id: i64,
    pub name: String,
    /// Backslash-separated folder path, e.g. `Subject\perf`
    pub folder_path: String,
}

/// One folder of the remote taxonomy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFolder {
    pub id: i64,
    pub parent_id: i64,
    pub name: String,
    /// Backslash-separated full path, e.g. `Subject\perf\checkout`
    pub full_path: String,
}

#[async_trait::async_trait]
pub trait IRemoteScriptSystem: Send + Sync {
    /// Authenticates the shared session
    ///
    /// `use_token` selects client-token authentication instead of user
    /// credentials. Returns `Ok(false)` when the credentials are rejected.
    async fn login(&self, user: &str, secret: &str, use_token: bool)
        -> Result<bool, RemoteCallError>;

    /// Ends the shared session
    async fn logout(&self) -> Result<(), RemoteCallError>;

    /// Binds the current session to a domain/project context
    async fn bind_project(&self, domain: &str, project: &str) -> Result<(), RemoteCallError>;

    /// Lists every unit in a project
    async fn list_units(&self, domain: &str, project: &str)
        -> Result<Vec<RemoteUnit>, RemoteCallError>;

    /// Uploads an archive into `folder_path`, returning the stored unit
    async fn upload_unit(
        &self,
        domain: &str,
        project: &str,
        folder_path: &str,
        archive: &Path,
    ) -> Result<RemoteUnit, RemoteCallError>;

    /// Deletes a unit by its remote id
    async fn delete_unit(&self, domain: &str, project: &str, id: i64)
        -> Result<(), RemoteCallError>;

    /// Lists the folder taxonomy of a project
    async fn list_folders(&self, domain: &str, project: &str)
        -> Result<Vec<RemoteFolder>, RemoteCallError>;

    /// Creates `name` under `parent_path`
    async fn create_folder(
        &self,
        domain: &str,
        project: &str,
        parent_path: &str,
        name: &str,
    ) -> Result<RemoteFolder, RemoteCallError>;
}
