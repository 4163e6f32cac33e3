//! End-to-end API tests: login, session check, sandboxed file operations.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use axum_extra::extract::cookie::Key;
use http_body_util::BodyExt;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use paneld::api::{self, AppState};
use paneld::audit::AuditLog;
use paneld::config::SessionConfig;
use paneld::kv::KvStore;
use paneld::session::{SessionStore, SessionValidator};
use paneld::users::UserStore;

struct TestPanel {
    router: Router,
    _temp: TempDir,
    base_dir: std::path::PathBuf,
}

async fn setup() -> TestPanel {
    let temp = TempDir::new().unwrap();
    let base_dir = temp.path().join("sandbox");
    std::fs::create_dir_all(base_dir.join("docs")).unwrap();
    std::fs::write(base_dir.join("readme.txt"), "hello").unwrap();

    let users = Arc::new(
        UserStore::open(KvStore::new(&temp.path().join("users")).unwrap()).unwrap(),
    );
    users.create_user("admin", "admin", "s3cret").await.unwrap();

    let sessions = SessionStore::new(KvStore::new(&temp.path().join("sessions")).unwrap());
    let audit = AuditLog::spawn(&temp.path().join("logs")).unwrap();

    let state = Arc::new(AppState {
        validator: SessionValidator::new(sessions, users.clone()),
        users,
        audit,
        base_dir: base_dir.clone(),
        session: SessionConfig::default(),
        cookie_key: Key::generate(),
    });

    TestPanel {
        router: api::router(state),
        _temp: temp,
        base_dir,
    }
}

fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn session_cookie(response: &axum::response::Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("paneld_session="))
        .map(|v| v.split(';').next().unwrap().to_string())
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn login(panel: &TestPanel) -> String {
    let response = panel
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/login",
            None,
            serde_json::json!({"username": "admin", "password": "s3cret"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    session_cookie(&response).expect("login must set the session cookie")
}

#[tokio::test]
async fn test_login_and_session_check() {
    let panel = setup().await;
    let cookie = login(&panel).await;

    let response = panel
        .router
        .clone()
        .oneshot(get_request("/api/session", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["username"], "admin");
    assert_eq!(body["role"], "admin");
    assert_eq!(body["isImpersonating"], false);
    assert_eq!(body["settings"]["inactivityTimeoutMinutes"], 30);
}

#[tokio::test]
async fn test_bad_password_rejected() {
    let panel = setup().await;
    let response = panel
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/login",
            None,
            serde_json::json!({"username": "admin", "password": "wrong"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_check_without_cookie() {
    let panel = setup().await;
    let response = panel
        .router
        .clone()
        .oneshot(get_request("/api/session", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_forged_cookie_rejected() {
    let panel = setup().await;
    // Unsigned garbage fails the jar signature check and reads as no session.
    let response = panel
        .router
        .clone()
        .oneshot(get_request(
            "/api/session",
            Some("paneld_session=forgedvalue"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_invalidates_session() {
    let panel = setup().await;
    let cookie = login(&panel).await;

    let response = panel
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/logout",
            Some(&cookie),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The record is gone; replaying the old cookie fails.
    let response = panel
        .router
        .clone()
        .oneshot(get_request("/api/session", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_list_files() {
    let panel = setup().await;
    let cookie = login(&panel).await;

    let response = panel
        .router
        .clone()
        .oneshot(get_request("/api/files?path=/", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["path"], "/");
    let files = body["files"].as_array().unwrap();
    let names: Vec<&str> = files.iter().map(|f| f["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["docs", "readme.txt"]);

    let readme = &files[1];
    assert_eq!(readme["type"], "file");
    assert_eq!(readme["size"], 5);
    assert_eq!(readme["permissions"].as_str().unwrap().len(), 10);
    assert_eq!(readme["octalPermissions"].as_str().unwrap().len(), 4);
}

#[tokio::test]
async fn test_list_requires_session() {
    let panel = setup().await;
    let response = panel
        .router
        .clone()
        .oneshot(get_request("/api/files?path=/", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_list_missing_directory_is_404() {
    let panel = setup().await;
    let cookie = login(&panel).await;

    let response = panel
        .router
        .clone()
        .oneshot(get_request("/api/files?path=/nope", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_file_is_400() {
    let panel = setup().await;
    let cookie = login(&panel).await;

    let response = panel
        .router
        .clone()
        .oneshot(get_request("/api/files?path=/readme.txt", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_traversal_never_escapes_sandbox() {
    let panel = setup().await;
    let cookie = login(&panel).await;

    // "../../etc" resolves inside the sandbox, where it does not exist.
    let response = panel
        .router
        .clone()
        .oneshot(get_request(
            "/api/files?path=../../../../etc",
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(!panel.base_dir.join("etc").exists());
}

#[tokio::test]
async fn test_create_file_and_conflict() {
    let panel = setup().await;
    let cookie = login(&panel).await;

    let request = serde_json::json!({"path": "/docs", "name": "notes.txt", "type": "file"});
    let response = panel
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/files/create",
            Some(&cookie),
            request.clone(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let created = panel.base_dir.join("docs/notes.txt");
    assert!(created.is_file());
    assert_eq!(std::fs::metadata(&created).unwrap().len(), 0);

    // Second create for the same name conflicts.
    let response = panel
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/files/create",
            Some(&cookie),
            request,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_create_rejects_separator_in_name() {
    let panel = setup().await;
    let cookie = login(&panel).await;

    let response = panel
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/files/create",
            Some(&cookie),
            serde_json::json!({"path": "/", "name": "a/b", "type": "file"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_missing_parent_is_404() {
    let panel = setup().await;
    let cookie = login(&panel).await;

    let response = panel
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/files/create",
            Some(&cookie),
            serde_json::json!({"path": "/missing", "name": "x", "type": "folder"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_chmod() {
    let panel = setup().await;
    let cookie = login(&panel).await;

    let response = panel
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/files/chmod",
            Some(&cookie),
            serde_json::json!({"path": "/readme.txt", "mode": "0755"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    use std::os::unix::fs::MetadataExt;
    let mode = std::fs::metadata(panel.base_dir.join("readme.txt"))
        .unwrap()
        .mode();
    assert_eq!(mode & 0o7777, 0o755);
}

#[tokio::test]
async fn test_chmod_invalid_mode_and_missing_target() {
    let panel = setup().await;
    let cookie = login(&panel).await;

    let response = panel
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/files/chmod",
            Some(&cookie),
            serde_json::json!({"path": "/readme.txt", "mode": "999"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = panel
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/files/chmod",
            Some(&cookie),
            serde_json::json!({"path": "/missing", "mode": "0755"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
