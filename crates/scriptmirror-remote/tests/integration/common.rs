//! Shared test helpers for the remote adapter integration tests
//!
//! Each helper starts a wiremock server and returns a client pointing at it.

use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scriptmirror_remote::{ScriptServerClient, SourceRepositoryClient};

pub const TOKEN: &str = "glpat-test-token";
pub const PROJECT_ID: u64 = 42;

/// Returns a (MockServer, SourceRepositoryClient) pair rooted at `/api/v4`
pub async fn setup_repository_mock() -> (MockServer, SourceRepositoryClient) {
    let server = MockServer::start().await;
    let base = format!("{}/api/v4", server.uri());
    let client = SourceRepositoryClient::new(&base, TOKEN, Duration::from_secs(5))
        .expect("repository client");
    (server, client)
}

/// Returns a (MockServer, ScriptServerClient) pair
pub async fn setup_script_server_mock() -> (MockServer, ScriptServerClient) {
    let server = MockServer::start().await;
    let client =
        ScriptServerClient::new(&server.uri(), Duration::from_secs(5)).expect("script client");
    (server, client)
}

/// A tree entry as returned by the repository API
pub fn tree_item(kind: &str, item_path: &str) -> serde_json::Value {
    let name = item_path.rsplit('/').next().unwrap_or(item_path);
    serde_json::json!({
        "id": format!("id-{}", item_path),
        "name": name,
        "type": kind,
        "path": item_path,
        "mode": if kind == "tree" { "040000" } else { "100644" }
    })
}

/// Mounts a successful basic-auth login endpoint
pub async fn mount_login_ok(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/LoadTest/rest/authentication-point/authenticate"))
        .respond_with(
            ResponseTemplate::new(200).append_header("Set-Cookie", "LWSSO_COOKIE_KEY=abc; Path=/"),
        )
        .mount(server)
        .await;
}

/// Mounts the folder listing for PERF/Checkout
pub async fn mount_folders(server: &MockServer, folders: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/LoadTest/rest/domains/PERF/projects/Checkout/testplan"))
        .respond_with(ResponseTemplate::new(200).set_body_json(folders))
        .mount(server)
        .await;
}
