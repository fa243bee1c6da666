//! GitLab client tests against an in-process stand-in server.
//!
//! The server answers the four endpoints the watchdog uses and rejects any
//! request without the expected `PRIVATE-TOKEN` header.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::extract::{Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use mr_watchdog_lib::error::AppError;
use mr_watchdog_lib::models::Owner;
use mr_watchdog_lib::services::resolver;
use mr_watchdog_lib::services::{GitLabClient, GitLabClientConfig, SourceControl};

const TOKEN: &str = "glpat-test-token";

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("private-token")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == TOKEN)
        .unwrap_or(false)
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, "{\"message\":\"401 Unauthorized\"}").into_response()
}

fn page(params: &HashMap<String, String>) -> u32 {
    params
        .get("page")
        .and_then(|p| p.parse().ok())
        .unwrap_or(1)
}

fn paged(body: Value, next_page: &str) -> Response {
    ([("x-next-page", next_page.to_string())], Json(body)).into_response()
}

async fn group_projects(
    Path(group): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    match (group.as_str(), page(&params)) {
        ("grp", 1) => paged(json!([{"id": 7, "name": "demo-app", "path": "demo-app"}]), "2"),
        ("grp", _) => paged(json!([{"id": 42, "name": "demo"}, {"id": 43, "name": "demo"}]), ""),
        ("parent/child", _) => paged(json!([{"id": 77, "name": "nested"}]), ""),
        ("broken", _) => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
        _ => (StatusCode::NOT_FOUND, "{\"message\":\"404 Group Not Found\"}").into_response(),
    }
}

async fn users(Query(params): Query<HashMap<String, String>>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let body = match params.get("username").map(String::as_str) {
        Some("alice") => json!([
            {"id": 1, "username": "alice", "name": "Alice A"},
            {"id": 2, "username": "alice", "name": "Alice B"}
        ]),
        Some("bob") => json!([{"id": 5, "username": "bob", "name": "Bob"}]),
        Some("carol") => json!([
            {"id": 8, "username": "carol-bot", "name": "Carol Bot"},
            {"id": 9, "username": "carol", "name": "Carol"}
        ]),
        Some("dave") => json!([{"id": 10, "username": "dave-bot", "name": "Dave Bot"}]),
        _ => json!([]),
    };
    Json(body).into_response()
}

async fn user_projects(
    Path(user_id): Path<i64>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    if user_id != 5 {
        return (StatusCode::NOT_FOUND, "{\"message\":\"404 User Not Found\"}").into_response();
    }
    let body = match params.get("search").map(String::as_str) {
        Some("dotfiles") => json!([
            {"id": 11, "name": "dotfiles-old"},
            {"id": 12, "name": "dotfiles"}
        ]),
        _ => json!([{"id": 13, "name": "something-else"}]),
    };
    paged(body, "")
}

fn merge_request(iid: i64, username: &str) -> Value {
    json!({
        "id": 1000 + iid,
        "iid": iid,
        "project_id": 42,
        "title": format!("MR {iid}"),
        "state": "opened",
        "created_at": "2024-01-15T10:30:00.000Z",
        "updated_at": "2024-01-15T11:00:00.000Z",
        "work_in_progress": false,
        "draft": false,
        "web_url": format!("https://gitlab.example.com/grp/demo/-/merge_requests/{iid}"),
        "author": {"id": 3, "name": username, "username": username}
    })
}

async fn merge_requests(
    Path(project_id): Path<i64>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    if params.get("state").map(String::as_str) != Some("opened") {
        return (StatusCode::BAD_REQUEST, "state must be opened").into_response();
    }
    match (project_id, page(&params)) {
        (42, 1) => paged(json!([merge_request(1, "alice")]), "2"),
        (42, _) => paged(json!([merge_request(2, "alice"), merge_request(3, "bob")]), ""),
        (500, _) => (StatusCode::BAD_GATEWAY, "upstream unavailable").into_response(),
        _ => (StatusCode::NOT_FOUND, "{\"message\":\"404 Project Not Found\"}").into_response(),
    }
}

async fn spawn_server() -> SocketAddr {
    let app = Router::new()
        .route("/api/v4/groups/{group}/projects", get(group_projects))
        .route("/api/v4/users", get(users))
        .route("/api/v4/users/{id}/projects", get(user_projects))
        .route("/api/v4/projects/{id}/merge_requests", get(merge_requests));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client_for(addr: SocketAddr, token: &str) -> GitLabClient {
    GitLabClient::new(GitLabClientConfig {
        base_url: format!("http://{}/", addr),
        token: token.to_string(),
        timeout_secs: 5,
    })
    .unwrap()
}

#[tokio::test]
async fn test_group_projects_follow_pagination() {
    let addr = spawn_server().await;
    let client = client_for(addr, TOKEN);

    let projects = client.group_projects("grp").await.unwrap();
    let ids: Vec<i64> = projects.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![7, 42, 43]);
}

#[tokio::test]
async fn test_group_resolution_end_to_end() {
    let addr = spawn_server().await;
    let client = client_for(addr, TOKEN);
    let owner = Owner::Group {
        name: "grp".to_string(),
    };

    let project = resolver::resolve(&client, &owner, "demo").await.unwrap();
    assert_eq!(project.id, 42);

    let err = resolver::resolve(&client, &owner, "Demo").await.unwrap_err();
    assert!(matches!(err, AppError::ProjectNotFound { .. }));
}

#[tokio::test]
async fn test_nested_group_path_is_encoded() {
    let addr = spawn_server().await;
    let client = client_for(addr, TOKEN);

    let projects = client.group_projects("parent/child").await.unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].id, 77);
}

#[tokio::test]
async fn test_missing_group_is_not_found() {
    let addr = spawn_server().await;
    let client = client_for(addr, TOKEN);

    let err = client.group_projects("nobody").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound { .. }));
}

#[tokio::test]
async fn test_other_failures_carry_raw_body() {
    let addr = spawn_server().await;
    let client = client_for(addr, TOKEN);

    match client.group_projects("broken").await.unwrap_err() {
        AppError::GitLabApi {
            message,
            status_code,
            ..
        } => {
            assert_eq!(message, "boom");
            assert_eq!(status_code, Some(500));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_token_is_sent() {
    let addr = spawn_server().await;
    let client = client_for(addr, "wrong-token");

    match client.group_projects("grp").await.unwrap_err() {
        AppError::GitLabApi { status_code, .. } => assert_eq!(status_code, Some(401)),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_ambiguous_username_is_rejected() {
    let addr = spawn_server().await;
    let client = client_for(addr, TOKEN);

    let err = client
        .individual_project_id("alice", "dotfiles")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AmbiguousOwner { matches: 2, .. }));
}

#[tokio::test]
async fn test_unknown_username_is_rejected() {
    let addr = spawn_server().await;
    let client = client_for(addr, TOKEN);

    let err = client.find_user_id("ghost").await.unwrap_err();
    assert!(matches!(err, AppError::AmbiguousOwner { matches: 0, .. }));
}

#[tokio::test]
async fn test_username_lookup_requires_exact_match() {
    let addr = spawn_server().await;
    let client = client_for(addr, TOKEN);

    assert_eq!(client.find_user_id("carol").await.unwrap(), 9);

    let err = client.find_user_id("dave").await.unwrap_err();
    assert!(matches!(err, AppError::AmbiguousOwner { matches: 0, .. }));
}

#[tokio::test]
async fn test_individual_project_exact_match() {
    let addr = spawn_server().await;
    let client = client_for(addr, TOKEN);

    let id = client
        .individual_project_id("bob", "dotfiles")
        .await
        .unwrap();
    assert_eq!(id, 12);

    let err = client
        .individual_project_id("bob", "website")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound { .. }));
}

#[tokio::test]
async fn test_open_merge_requests_across_pages() {
    let addr = spawn_server().await;
    let client = client_for(addr, TOKEN);

    let requests = client.open_merge_requests(42).await.unwrap();
    let iids: Vec<i64> = requests.iter().map(|mr| mr.iid).collect();
    assert_eq!(iids, vec![1, 2, 3]);
    assert_eq!(requests[2].author.username, "bob");
}

#[tokio::test]
async fn test_merge_request_fetch_failure_is_classified() {
    let addr = spawn_server().await;
    let client = client_for(addr, TOKEN);

    match client.open_merge_requests(500).await.unwrap_err() {
        AppError::GitLabApi {
            message,
            status_code,
            endpoint,
        } => {
            assert_eq!(message, "upstream unavailable");
            assert_eq!(status_code, Some(502));
            assert_eq!(endpoint.as_deref(), Some("/projects/500/merge_requests"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_host_is_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(addr, TOKEN);
    let err = client.open_merge_requests(42).await.unwrap_err();
    assert!(matches!(err, AppError::Network { .. }));
}
