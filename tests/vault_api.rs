//! End-to-end HTTP tests against the full router: vault lifecycle, the
//! session/CSRF gate, and entry CRUD, driven with `tower::ServiceExt::oneshot`
//! instead of binding a real socket.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use local_vault::api_server::{self, AppState};
use local_vault::config::AppConfig;
use local_vault::store::RecordStore;

fn test_config(data_dir: &std::path::Path) -> AppConfig {
    AppConfig {
        app_name: "Local Vault API".into(),
        app_env: "test".into(),
        app_host: "127.0.0.1".into(),
        app_port: 0,
        app_log_level: "error".into(),
        app_cors_allowed_origin: "http://localhost:5173".into(),
        app_session_idle_minutes: 15,
        data_dir: data_dir.to_path_buf(),
    }
}

fn test_app() -> (axum::Router, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = RecordStore::open(&dir.path().join("vault.db")).unwrap();
    let state = AppState::new(store, test_config(dir.path()));
    (api_server::create_router(state), dir)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Pulls the bare `name=value` pair out of a `Set-Cookie` header, discarding
/// attributes like `Path`/`HttpOnly`/`Max-Age`.
fn cookie_pairs(response: &axum::response::Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(|raw| raw.split(';').next().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn health_check_is_exempt_and_ok() {
    let (app, _dir) = test_app();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn vault_lifecycle_setup_unlock_entry_lock() {
    let (app, _dir) = test_app();

    let status = app
        .clone()
        .oneshot(Request::builder().uri("/vault/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(body_json(status).await["status"], "NO_VAULT");

    let setup = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/vault/setup")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"masterPassword": "CorrectHorseBatteryStaple!", "hint": "the usual"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(setup.status(), StatusCode::CREATED);

    let unlock = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/vault/unlock")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"masterPassword": "CorrectHorseBatteryStaple!"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(unlock.status(), StatusCode::OK);
    let cookies = cookie_pairs(&unlock);
    let session_cookie = cookies.iter().find(|c| c.starts_with("session_token=")).unwrap().clone();
    let csrf_cookie = cookies.iter().find(|c| c.starts_with("csrf_token=")).unwrap().clone();
    let csrf_value = csrf_cookie.trim_start_matches("csrf_token=").to_string();

    let status = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/vault/status")
                .header(header::COOKIE, format!("{session_cookie}; {csrf_cookie}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_json(status).await["status"], "UNLOCKED");

    let create = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/entries")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::COOKIE, format!("{session_cookie}; {csrf_cookie}"))
                .header("x-csrf-token", csrf_value.clone())
                .body(Body::from(
                    json!({
                        "title": "Example",
                        "url": "https://example.com",
                        "username": "alice",
                        "password": "hunter2-hunter2",
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(create.status(), StatusCode::CREATED);
    let created = body_json(create).await;
    assert_eq!(created["title"], "Example");

    let list = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/entries")
                .header(header::COOKIE, format!("{session_cookie}; {csrf_cookie}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let entries = body_json(list).await;
    assert_eq!(entries.as_array().unwrap().len(), 1);

    let lock = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/vault/lock")
                .header(header::COOKIE, format!("{session_cookie}; {csrf_cookie}"))
                .header("x-csrf-token", csrf_value)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(lock.status(), StatusCode::NO_CONTENT);

    let status = app
        .clone()
        .oneshot(Request::builder().uri("/vault/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(body_json(status).await["status"], "LOCKED");
}

#[tokio::test]
async fn state_changing_request_without_session_is_unauthorized() {
    let (app, _dir) = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/entries")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn state_changing_request_with_session_but_no_csrf_header_is_forbidden() {
    let (app, _dir) = test_app();

    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/vault/setup")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"masterPassword": "CorrectHorseBatteryStaple!"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let unlock = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/vault/unlock")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"masterPassword": "CorrectHorseBatteryStaple!"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let cookies = cookie_pairs(&unlock);
    let session_cookie = cookies.iter().find(|c| c.starts_with("session_token=")).unwrap().clone();
    let csrf_cookie = cookies.iter().find(|c| c.starts_with("csrf_token=")).unwrap().clone();

    // Cookie pair present, but the `x-csrf-token` header is missing entirely.
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/entries")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::COOKIE, format!("{session_cookie}; {csrf_cookie}"))
                .body(Body::from(json!({}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn setting_up_an_existing_vault_is_a_conflict() {
    let (app, _dir) = test_app();
    let body = || Body::from(json!({"masterPassword": "CorrectHorseBatteryStaple!"}).to_string());

    let first = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/vault/setup")
                .header(header::CONTENT_TYPE, "application/json")
                .body(body())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/vault/setup")
                .header(header::CONTENT_TYPE, "application/json")
                .body(body())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
}
