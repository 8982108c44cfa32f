//! Remote script server client
//!
//! Talks to the `LoadTest/rest` API. The server keeps its session in
//! cookies, so the underlying reqwest client carries a cookie store and is
//! shared by every call made through one [`ScriptServerClient`].
//!
//! Project-scoped endpoints live under
//! `LoadTest/rest/domains/{domain}/projects/{project}/...`; binding the
//! session to a project goes through the web login endpoint
//! `loadtest/rest-pcweb/login/LoginToProject`.

use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use scriptmirror_core::domain::RemoteCallError;
use scriptmirror_core::ports::{IRemoteScriptSystem, RemoteFolder, RemoteUnit};

use crate::http::{
    ensure_success, join_segments, parse_base_url, read_json, send, transport_error,
};

const API_ROOT: [&str; 2] = ["LoadTest", "rest"];
const AUTH_POINT: &str = "authentication-point";
const WEB_LOGIN: [&str; 4] = ["loadtest", "rest-pcweb", "login", "LoginToProject"];

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct AuthenticateClientRequest<'a> {
    #[serde(rename = "ClientIdKey")]
    client_id_key: &'a str,
    #[serde(rename = "ClientSecretKey")]
    client_secret_key: &'a str,
}

#[derive(Debug, Serialize)]
struct UploadMetadata<'a> {
    #[serde(rename = "TestFolderPath")]
    test_folder_path: &'a str,
    #[serde(rename = "Overwrite")]
    overwrite: bool,
    #[serde(rename = "RuntimeOnly")]
    runtime_only: bool,
    #[serde(rename = "KeepCheckedOut")]
    keep_checked_out: bool,
}

#[derive(Debug, Serialize)]
struct CreateFolderRequest<'a> {
    #[serde(rename = "Path")]
    path: &'a str,
    #[serde(rename = "Name")]
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct ScriptResponse {
    #[serde(rename = "ID")]
    id: Option<i64>,
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "TestFolderPath", default)]
    test_folder_path: String,
}

#[derive(Debug, Deserialize)]
struct FolderResponse {
    #[serde(rename = "Id")]
    id: i64,
    #[serde(rename = "ParentId", default)]
    parent_id: i64,
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "FullPath", default)]
    full_path: String,
}

impl From<FolderResponse> for RemoteFolder {
    fn from(folder: FolderResponse) -> Self {
        RemoteFolder {
            id: folder.id,
            parent_id: folder.parent_id,
            name: folder.name,
            full_path: folder.full_path,
        }
    }
}

fn into_unit(script: ScriptResponse, context: &str) -> Result<RemoteUnit, RemoteCallError> {
    let id = script.id.ok_or_else(|| {
        RemoteCallError::InvalidResponse(format!("{}: response carried no script ID", context))
    })?;
    Ok(RemoteUnit {
        id,
        name: script.name,
        folder_path: script.test_folder_path,
    })
}

// ============================================================================
// ScriptServerClient
// ============================================================================

/// HTTP client for the remote script server
pub struct ScriptServerClient {
    client: Client,
    base_url: Url,
}

impl ScriptServerClient {
    /// Creates a client with a cookie-backed session and a per-request timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteCallError> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .map_err(|e| transport_error(e, "build script server client"))?;
        Ok(Self {
            client,
            base_url: parse_base_url(base_url)?,
        })
    }

    /// Returns the server root requests are built against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Request builder for a path below `LoadTest/rest`
    pub fn api_request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let mut path: Vec<&str> = API_ROOT.to_vec();
        path.extend_from_slice(segments);
        self.client
            .request(method, join_segments(&self.base_url, &path))
    }

    /// Request builder for a path below `LoadTest/rest/domains/{d}/projects/{p}`
    pub fn project_request(
        &self,
        method: Method,
        domain: &str,
        project: &str,
        segments: &[&str],
    ) -> RequestBuilder {
        let mut path = vec!["domains", domain, "projects", project];
        path.extend_from_slice(segments);
        self.api_request(method, &path)
    }
}

#[async_trait::async_trait]
impl IRemoteScriptSystem for ScriptServerClient {
    async fn login(
        &self,
        user: &str,
        secret: &str,
        use_token: bool,
    ) -> Result<bool, RemoteCallError> {
        let (request, context) = if use_token {
            let body = AuthenticateClientRequest {
                client_id_key: user,
                client_secret_key: secret,
            };
            (
                self.api_request(Method::POST, &[AUTH_POINT, "AuthenticateClient"])
                    .json(&body),
                "token login",
            )
        } else {
            (
                self.api_request(Method::GET, &[AUTH_POINT, "authenticate"])
                    .basic_auth(user, Some(secret)),
                "login",
            )
        };

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(e, context))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!(status = status.as_u16(), use_token, "Credentials rejected");
            return Ok(false);
        }

        ensure_success(response, context).await?;
        debug!(use_token, "Authenticated");
        Ok(true)
    }

    async fn logout(&self) -> Result<(), RemoteCallError> {
        send(
            self.api_request(Method::GET, &[AUTH_POINT, "logout"]),
            "logout",
        )
        .await?;
        debug!("Logged out");
        Ok(())
    }

    async fn bind_project(&self, domain: &str, project: &str) -> Result<(), RemoteCallError> {
        let request = self
            .client
            .get(join_segments(&self.base_url, &WEB_LOGIN))
            .query(&[("domain", domain), ("project", project)]);

        send(request, &format!("bind project {}/{}", domain, project)).await?;
        debug!(domain, project, "Session bound to project");
        Ok(())
    }

    async fn list_units(
        &self,
        domain: &str,
        project: &str,
    ) -> Result<Vec<RemoteUnit>, RemoteCallError> {
        let context = format!("list scripts of {}/{}", domain, project);
        let response = send(
            self.project_request(Method::GET, domain, project, &["Scripts"]),
            &context,
        )
        .await?;
        let scripts: Vec<ScriptResponse> = read_json(response, &context).await?;

        scripts
            .into_iter()
            .map(|script| into_unit(script, &context))
            .collect()
    }

    async fn upload_unit(
        &self,
        domain: &str,
        project: &str,
        folder_path: &str,
        archive: &Path,
    ) -> Result<RemoteUnit, RemoteCallError> {
        let file_name = archive
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "script.zip".to_string());
        let context = format!("upload {} to {}", file_name, folder_path);

        let bytes = tokio::fs::read(archive).await.map_err(|e| {
            RemoteCallError::Transport(format!(
                "{}: failed to read {}: {}",
                context,
                archive.display(),
                e
            ))
        })?;

        let metadata = serde_json::to_string(&UploadMetadata {
            test_folder_path: folder_path,
            overwrite: true,
            runtime_only: true,
            keep_checked_out: false,
        })
        .map_err(|e| RemoteCallError::InvalidResponse(format!("{}: {}", context, e)))?;

        let metadata_part = Part::text(metadata)
            .mime_str("application/json")
            .map_err(|e| transport_error(e, &context))?;
        let file_part = Part::bytes(bytes)
            .file_name(file_name.clone())
            .mime_str("application/octet-stream")
            .map_err(|e| transport_error(e, &context))?;
        let form = Form::new()
            .part("metadata", metadata_part)
            .part("file", file_part);

        let response = send(
            self.project_request(Method::POST, domain, project, &["Scripts"])
                .multipart(form),
            &context,
        )
        .await?;
        let script: ScriptResponse = read_json(response, &context).await?;
        let unit = into_unit(script, &context)?;

        info!(id = unit.id, file = %file_name, folder = folder_path, "Script uploaded");
        Ok(unit)
    }

    async fn delete_unit(
        &self,
        domain: &str,
        project: &str,
        id: i64,
    ) -> Result<(), RemoteCallError> {
        let id_segment = id.to_string();
        send(
            self.project_request(
                Method::DELETE,
                domain,
                project,
                &["Scripts", id_segment.as_str()],
            ),
            &format!("delete script {}", id),
        )
        .await?;
        info!(id, "Script deleted");
        Ok(())
    }

    async fn list_folders(
        &self,
        domain: &str,
        project: &str,
    ) -> Result<Vec<RemoteFolder>, RemoteCallError> {
        let context = format!("list folders of {}/{}", domain, project);
        let response = send(
            self.project_request(Method::GET, domain, project, &["testplan"]),
            &context,
        )
        .await?;
        let folders: Vec<FolderResponse> = read_json(response, &context).await?;
        Ok(folders.into_iter().map(RemoteFolder::from).collect())
    }

    async fn create_folder(
        &self,
        domain: &str,
        project: &str,
        parent_path: &str,
        name: &str,
    ) -> Result<RemoteFolder, RemoteCallError> {
        let context = format!("create folder {} under {}", name, parent_path);
        let body = CreateFolderRequest {
            path: parent_path,
            name,
        };
        let response = send(
            self.project_request(Method::POST, domain, project, &["testplan"])
                .json(&body),
            &context,
        )
        .await?;
        let folder: FolderResponse = read_json(response, &context).await?;

        debug!(id = folder.id, path = %folder.full_path, "Folder created");
        Ok(folder.into())
    }
}
