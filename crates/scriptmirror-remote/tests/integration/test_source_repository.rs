//! Integration tests for the source repository client

use scriptmirror_core::domain::RemoteCallError;
use scriptmirror_core::ports::{ISourceRepository, TreeItemKind};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{self, tree_item, PROJECT_ID, TOKEN};

const TREE_PATH: &str = "/api/v4/projects/42/repository/tree";
const COMMITS_PATH: &str = "/api/v4/projects/42/repository/commits";
const ARCHIVE_PATH: &str = "/api/v4/projects/42/repository/archive.zip";

// ============================================================================
// Tree listing
// ============================================================================

#[tokio::test]
async fn test_list_tree_sends_query_and_token() {
    let (server, client) = common::setup_repository_mock().await;

    Mock::given(method("GET"))
        .and(path(TREE_PATH))
        .and(header("PRIVATE-TOKEN", TOKEN))
        .and(query_param("ref", "main"))
        .and(query_param("recursive", "true"))
        .and(query_param("per_page", "100"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            tree_item("tree", "perf/login"),
            tree_item("blob", "perf/login/login.usr"),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let items = client.list_tree(PROJECT_ID, "main", 2, 100).await.unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].kind, TreeItemKind::Tree);
    assert_eq!(items[1].name, "login.usr");
    assert_eq!(items[1].path, "perf/login/login.usr");
    assert!(items[1].is_blob());
}

#[tokio::test]
async fn test_list_tree_unknown_ref_is_not_found() {
    let (server, client) = common::setup_repository_mock().await;

    Mock::given(method("GET"))
        .and(path(TREE_PATH))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(serde_json::json!({"message": "404 Tree Not Found"})),
        )
        .mount(&server)
        .await;

    let err = client.list_tree(PROJECT_ID, "nope", 1, 100).await.unwrap_err();
    match err {
        RemoteCallError::NotFound(msg) => assert!(msg.contains("404 Tree Not Found")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_list_tree_bad_token_is_authentication_failure() {
    let (server, client) = common::setup_repository_mock().await;

    Mock::given(method("GET"))
        .and(path(TREE_PATH))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(serde_json::json!({"message": "401 Unauthorized"})),
        )
        .mount(&server)
        .await;

    let err = client.list_tree(PROJECT_ID, "main", 1, 100).await.unwrap_err();
    assert!(matches!(err, RemoteCallError::AuthenticationFailed(_)));
}

#[tokio::test]
async fn test_list_tree_garbage_body_is_invalid_response() {
    let (server, client) = common::setup_repository_mock().await;

    Mock::given(method("GET"))
        .and(path(TREE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = client.list_tree(PROJECT_ID, "main", 1, 100).await.unwrap_err();
    assert!(matches!(err, RemoteCallError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_server_error_carries_status() {
    let (server, client) = common::setup_repository_mock().await;

    Mock::given(method("GET"))
        .and(path(TREE_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let err = client.list_tree(PROJECT_ID, "main", 1, 100).await.unwrap_err();
    assert_eq!(
        err,
        RemoteCallError::Server {
            status: 503,
            message: "list tree of project 42 page 1: upstream down".to_string()
        }
    );
}

// ============================================================================
// Latest version
// ============================================================================

#[tokio::test]
async fn test_latest_version_returns_first_commit() {
    let (server, client) = common::setup_repository_mock().await;

    Mock::given(method("GET"))
        .and(path(COMMITS_PATH))
        .and(query_param("ref_name", "main"))
        .and(query_param("path", "perf/login"))
        .and(query_param("per_page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": "9f8e7d6c5b4a", "short_id": "9f8e7d6c", "committed_date": "2026-03-01T10:00:00.000+00:00"}
        ])))
        .mount(&server)
        .await;

    let stamp = client
        .latest_version(PROJECT_ID, "main", "perf/login")
        .await
        .unwrap()
        .expect("stamp");
    assert_eq!(stamp.sha, "9f8e7d6c5b4a");
    assert_eq!(stamp.committed_at, "2026-03-01T10:00:00.000+00:00");
}

#[tokio::test]
async fn test_latest_version_without_commits_is_none() {
    let (server, client) = common::setup_repository_mock().await;

    Mock::given(method("GET"))
        .and(path(COMMITS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let stamp = client
        .latest_version(PROJECT_ID, "main", "perf/ghost")
        .await
        .unwrap();
    assert!(stamp.is_none());
}

// ============================================================================
// Archive download
// ============================================================================

#[tokio::test]
async fn test_download_archive_returns_bytes() {
    let (server, client) = common::setup_repository_mock().await;
    let archive: Vec<u8> = (0..4096).map(|i| (i % 251) as u8).collect();

    Mock::given(method("GET"))
        .and(path(ARCHIVE_PATH))
        .and(query_param("path", "perf/login"))
        .and(query_param("sha", "9f8e7d6c"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(archive.clone())
                .append_header("Content-Type", "application/zip"),
        )
        .mount(&server)
        .await;

    let bytes = client
        .download_archive(PROJECT_ID, "9f8e7d6c", "perf/login")
        .await
        .unwrap();
    assert_eq!(bytes, archive);
}
