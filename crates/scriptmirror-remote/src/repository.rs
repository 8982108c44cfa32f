//! Source repository client
//!
//! Typed client for the GitLab-compatible REST API v4. Authenticates every
//! request with a `PRIVATE-TOKEN` header.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use scriptmirror_core::ports::ISourceRepository;
//! use scriptmirror_remote::SourceRepositoryClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = SourceRepositoryClient::new(
//!     "https://gitlab.example.com/api/v4",
//!     "glpat-xxxx",
//!     Duration::from_secs(120),
//! )?;
//! let first_page = client.list_tree(42, "main", 1, 100).await?;
//! println!("{} entries", first_page.len());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Url};
use serde::Deserialize;
use tracing::debug;

use scriptmirror_core::domain::RemoteCallError;
use scriptmirror_core::ports::{ISourceRepository, TreeItem, TreeItemKind, VersionStamp};

use crate::http::{join_segments, parse_base_url, read_json, send, transport_error};

const TOKEN_HEADER: &str = "PRIVATE-TOKEN";

// ============================================================================
// Repository API response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct TreeItemResponse {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: TreeItemKind,
}

impl From<TreeItemResponse> for TreeItem {
    fn from(item: TreeItemResponse) -> Self {
        TreeItem {
            name: item.name,
            path: item.path,
            kind: item.kind,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    committed_date: Option<String>,
}

// ============================================================================
// SourceRepositoryClient
// ============================================================================

/// HTTP client for the source repository API
pub struct SourceRepositoryClient {
    client: Client,
    base_url: Url,
    token: String,
}

impl SourceRepositoryClient {
    /// Creates a client with a per-request timeout
    ///
    /// # Arguments
    /// * `base_url` - API root, e.g. `https://gitlab.example.com/api/v4`
    /// * `token` - Private access token
    /// * `timeout` - Applied to every request
    pub fn new(
        base_url: &str,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RemoteCallError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| transport_error(e, "build repository client"))?;
        Ok(Self {
            client,
            base_url: parse_base_url(base_url)?,
            token: token.into(),
        })
    }

    /// Creates a client with default reqwest settings (useful for testing)
    pub fn with_base_url(
        token: impl Into<String>,
        base_url: &str,
    ) -> Result<Self, RemoteCallError> {
        Ok(Self {
            client: Client::new(),
            base_url: parse_base_url(base_url)?,
            token: token.into(),
        })
    }

    /// Returns the API root requests are built against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Creates an authenticated request builder for the given path segments
    pub fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        self.client
            .request(method, join_segments(&self.base_url, segments))
            .header(TOKEN_HEADER, &self.token)
    }
}

#[async_trait::async_trait]
impl ISourceRepository for SourceRepositoryClient {
    async fn list_tree(
        &self,
        project_id: u64,
        git_ref: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<TreeItem>, RemoteCallError> {
        let project = project_id.to_string();
        let page_param = page.to_string();
        let per_page_param = per_page.to_string();
        let context = format!("list tree of project {} page {}", project_id, page);

        let request = self
            .request(Method::GET, &["projects", project.as_str(), "repository", "tree"])
            .query(&[
                ("ref", git_ref),
                ("recursive", "true"),
                ("per_page", per_page_param.as_str()),
                ("page", page_param.as_str()),
            ]);

        let response = send(request, &context).await?;
        let items: Vec<TreeItemResponse> = read_json(response, &context).await?;

        debug!(project_id, page, count = items.len(), "Fetched tree page");
        Ok(items.into_iter().map(TreeItem::from).collect())
    }

    async fn latest_version(
        &self,
        project_id: u64,
        git_ref: &str,
        path: &str,
    ) -> Result<Option<VersionStamp>, RemoteCallError> {
        let project = project_id.to_string();
        let context = format!("latest commit of {}", path);

        let request = self
            .request(Method::GET, &["projects", project.as_str(), "repository", "commits"])
            .query(&[("ref_name", git_ref), ("path", path), ("per_page", "1")]);

        let response = send(request, &context).await?;
        let commits: Vec<CommitResponse> = read_json(response, &context).await?;

        Ok(commits.into_iter().next().map(|commit| VersionStamp {
            sha: commit.id,
            committed_at: commit.committed_date.unwrap_or_default(),
        }))
    }

    async fn download_archive(
        &self,
        project_id: u64,
        sha: &str,
        path: &str,
    ) -> Result<Vec<u8>, RemoteCallError> {
        let project = project_id.to_string();
        let context = format!("download archive of {}", path);

        let request = self
            .request(Method::GET, &["projects", project.as_str(), "repository", "archive.zip"])
            .query(&[("path", path), ("sha", sha)]);

        let response = send(request, &context).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(e, &context))?;

        debug!(project_id, path, bytes = bytes.len(), "Downloaded archive");
        Ok(bytes.to_vec())
    }
}
