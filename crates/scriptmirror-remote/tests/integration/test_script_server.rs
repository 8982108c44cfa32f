//! Integration tests for the script server client

use scriptmirror_core::domain::RemoteCallError;
use scriptmirror_core::ports::IRemoteScriptSystem;
use wiremock::matchers::{body_json, body_string_contains, header, header_exists, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

const SCRIPTS_PATH: &str = "/LoadTest/rest/domains/PERF/projects/Checkout/Scripts";
const FOLDERS_PATH: &str = "/LoadTest/rest/domains/PERF/projects/Checkout/testplan";

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn test_basic_login_succeeds() {
    let (server, client) = common::setup_script_server_mock().await;

    Mock::given(method("GET"))
        .and(path("/LoadTest/rest/authentication-point/authenticate"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    assert!(client.login("svc-sync", "secret", false).await.unwrap());
}

#[tokio::test]
async fn test_token_login_posts_client_keys() {
    let (server, client) = common::setup_script_server_mock().await;

    Mock::given(method("POST"))
        .and(path("/LoadTest/rest/authentication-point/AuthenticateClient"))
        .and(body_json(serde_json::json!({
            "ClientIdKey": "client-id",
            "ClientSecretKey": "client-secret"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    assert!(client.login("client-id", "client-secret", true).await.unwrap());
}

#[tokio::test]
async fn test_rejected_credentials_return_false() {
    let (server, client) = common::setup_script_server_mock().await;

    Mock::given(method("GET"))
        .and(path("/LoadTest/rest/authentication-point/authenticate"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/LoadTest/rest/authentication-point/AuthenticateClient"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    assert!(!client.login("svc-sync", "wrong", false).await.unwrap());
    assert!(!client.login("client-id", "wrong", true).await.unwrap());
}

#[tokio::test]
async fn test_login_server_error_is_typed() {
    let (server, client) = common::setup_script_server_mock().await;

    Mock::given(method("GET"))
        .and(path("/LoadTest/rest/authentication-point/authenticate"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "message": "license server unreachable"
        })))
        .mount(&server)
        .await;

    let err = client.login("svc-sync", "secret", false).await.unwrap_err();
    assert_eq!(
        err,
        RemoteCallError::Server {
            status: 500,
            message: "login: license server unreachable".to_string()
        }
    );
}

#[tokio::test]
async fn test_session_cookie_is_reused_for_project_binding() {
    let (server, client) = common::setup_script_server_mock().await;
    common::mount_login_ok(&server).await;

    Mock::given(method("GET"))
        .and(path("/loadtest/rest-pcweb/login/LoginToProject"))
        .and(query_param("domain", "PERF"))
        .and(query_param("project", "Checkout"))
        .and(header("cookie", "LWSSO_COOKIE_KEY=abc"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    assert!(client.login("svc-sync", "secret", false).await.unwrap());
    client.bind_project("PERF", "Checkout").await.unwrap();
}

#[tokio::test]
async fn test_logout() {
    let (server, client) = common::setup_script_server_mock().await;

    Mock::given(method("GET"))
        .and(path("/LoadTest/rest/authentication-point/logout"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client.logout().await.unwrap();
}

// ============================================================================
// Scripts
// ============================================================================

#[tokio::test]
async fn test_list_units() {
    let (server, client) = common::setup_script_server_mock().await;

    Mock::given(method("GET"))
        .and(path(SCRIPTS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"ID": 17, "Name": "login", "TestFolderPath": "Subject\\perf", "Protocol": "HTTP"},
            {"ID": 18, "Name": "search", "TestFolderPath": "Subject\\perf\\api"}
        ])))
        .mount(&server)
        .await;

    let units = client.list_units("PERF", "Checkout").await.unwrap();
    assert_eq!(units.len(), 2);
    assert_eq!(units[0].id, 17);
    assert_eq!(units[0].name, "login");
    assert_eq!(units[1].folder_path, "Subject\\perf\\api");
}

#[tokio::test]
async fn test_upload_sends_multipart_metadata_and_file() {
    let (server, client) = common::setup_script_server_mock().await;
    let dir = tempfile::TempDir::new().unwrap();
    let archive = dir.path().join("login-9f8e7d6c.zip");
    std::fs::write(&archive, b"PK-fake-archive-content").unwrap();

    Mock::given(method("POST"))
        .and(path(SCRIPTS_PATH))
        .and(body_string_contains(r#""TestFolderPath":"Subject\\perf""#))
        .and(body_string_contains(r#""Overwrite":true"#))
        .and(body_string_contains("login-9f8e7d6c.zip"))
        .and(body_string_contains("PK-fake-archive-content"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "ID": 31, "Name": "login", "TestFolderPath": "Subject\\perf"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let unit = client
        .upload_unit("PERF", "Checkout", "Subject\\perf", &archive)
        .await
        .unwrap();
    assert_eq!(unit.id, 31);
    assert_eq!(unit.name, "login");
}

#[tokio::test]
async fn test_upload_response_without_id_is_invalid() {
    let (server, client) = common::setup_script_server_mock().await;
    let dir = tempfile::TempDir::new().unwrap();
    let archive = dir.path().join("login.zip");
    std::fs::write(&archive, b"PK").unwrap();

    Mock::given(method("POST"))
        .and(path(SCRIPTS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"Name": "login"})))
        .mount(&server)
        .await;

    let err = client
        .upload_unit("PERF", "Checkout", "Subject\\perf", &archive)
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteCallError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_upload_missing_archive_fails_without_request() {
    let (server, client) = common::setup_script_server_mock().await;

    Mock::given(method("POST"))
        .and(path(SCRIPTS_PATH))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let err = client
        .upload_unit(
            "PERF",
            "Checkout",
            "Subject\\perf",
            std::path::Path::new("/nonexistent/login.zip"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteCallError::Transport(_)));
}

#[tokio::test]
async fn test_delete_unit() {
    let (server, client) = common::setup_script_server_mock().await;

    Mock::given(method("DELETE"))
        .and(path(format!("{}/17", SCRIPTS_PATH)))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client.delete_unit("PERF", "Checkout", 17).await.unwrap();
}

#[tokio::test]
async fn test_delete_unknown_unit_is_not_found() {
    let (server, client) = common::setup_script_server_mock().await;

    Mock::given(method("DELETE"))
        .and(path(format!("{}/99", SCRIPTS_PATH)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client.delete_unit("PERF", "Checkout", 99).await.unwrap_err();
    assert!(matches!(err, RemoteCallError::NotFound(_)));
}

// ============================================================================
// Folders
// ============================================================================

#[tokio::test]
async fn test_list_folders() {
    let (server, client) = common::setup_script_server_mock().await;
    common::mount_folders(
        &server,
        serde_json::json!([
            {"Id": 1, "ParentId": 0, "Name": "Subject", "FullPath": "Subject"},
            {"Id": 5, "ParentId": 1, "Name": "perf", "FullPath": "Subject\\perf"}
        ]),
    )
    .await;

    let folders = client.list_folders("PERF", "Checkout").await.unwrap();
    assert_eq!(folders.len(), 2);
    assert_eq!(folders[1].id, 5);
    assert_eq!(folders[1].parent_id, 1);
    assert_eq!(folders[1].full_path, "Subject\\perf");
}

#[tokio::test]
async fn test_create_folder_posts_parent_and_name() {
    let (server, client) = common::setup_script_server_mock().await;

    Mock::given(method("POST"))
        .and(path(FOLDERS_PATH))
        .and(body_json(serde_json::json!({"Path": "Subject\\perf", "Name": "api"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "Id": 9, "ParentId": 5, "Name": "api", "FullPath": "Subject\\perf\\api"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let folder = client
        .create_folder("PERF", "Checkout", "Subject\\perf", "api")
        .await
        .unwrap();
    assert_eq!(folder.id, 9);
    assert_eq!(folder.full_path, "Subject\\perf\\api");
}

#[tokio::test]
async fn test_create_folder_conflict_is_client_error() {
    let (server, client) = common::setup_script_server_mock().await;

    Mock::given(method("POST"))
        .and(path(FOLDERS_PATH))
        .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
            "error": "folder already exists"
        })))
        .mount(&server)
        .await;

    let err = client
        .create_folder("PERF", "Checkout", "Subject\\perf", "api")
        .await
        .unwrap_err();
    match err {
        RemoteCallError::Client { status, message } => {
            assert_eq!(status, 409);
            assert!(message.contains("folder already exists"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}
