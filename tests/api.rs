use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use exys_auth::{
    app::build_app,
    auth::blacklist::MemoryTokenBlacklist,
    config::AppConfig,
    state::AppState,
    users::{memory::MemoryUserStore, UserStore},
};

fn app() -> Router {
    build_app(AppState::in_memory(AppConfig::for_tests()))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    bearer: Option<&str>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
        Some(body) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };

    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn register(app: &Router, email: &str) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/api/v1/auth/register/",
        Some(json!({
            "email": email,
            "password": "Secret12",
            "password_confirm": "Secret12",
        })),
        None,
    )
    .await
}

fn access(body: &Value) -> String {
    body["tokens"]["access"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn register_derives_handle_and_returns_tokens() {
    let app = app();

    let (status, body) = register(&app, "Jane.Doe@Example.com").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["email"], "jane.doe@example.com");
    assert_eq!(body["user"]["handle"], "jane.doe");
    assert_eq!(body["user"]["is_professional"], false);
    assert_eq!(body["user"]["profile_complete"], false);
    assert!(body["user"].get("password_hash").is_none());
    assert!(body["tokens"]["access"].is_string());
    assert!(body["tokens"]["refresh"].is_string());
    assert_eq!(body["next_steps"]["complete_profile"], true);
    assert_eq!(body["next_steps"]["profile_url"], "/api/v1/auth/profile/update/");

    let (status, body) = register(&app, "jane.doe@other.org").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["handle"], "jane.doe1");
}

#[tokio::test]
async fn register_rejects_duplicate_email_and_weak_password() {
    let app = app();
    register(&app, "jane@example.com").await;

    let (status, body) = register(&app, "JANE@example.com").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Registration failed");
    assert!(body["errors"]["email"].is_array());

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/register/",
        Some(json!({
            "email": "weak@example.com",
            "password": "ABC",
            "password_confirm": "ABC",
        })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["password"].is_array());
}

#[tokio::test]
async fn register_normalizes_license_and_rejects_duplicates() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/register/",
        Some(json!({
            "email": "doc@example.com",
            "password": "Secret12",
            "password_confirm": "Secret12",
            "license_number": "crm-12.345",
        })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["license_number"], "CRM12345");
    assert_eq!(body["user"]["is_professional"], true);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/register/",
        Some(json!({
            "email": "other@example.com",
            "password": "Secret12",
            "password_confirm": "Secret12",
            "license_number": "CRM12345",
        })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["license_number"].is_array());
}

#[tokio::test]
async fn login_failures_are_generic() {
    let app = app();
    register(&app, "jane@example.com").await;

    for (email, password) in [("jane@example.com", "Wrong123"), ("nobody@example.com", "Secret12")] {
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/auth/login/",
            Some(json!({ "email": email, "password": password })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"]["non_field_errors"][0], "Incorrect email or password.");
    }

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/login/",
        Some(json!({ "email": " JANE@example.com ", "password": "Secret12" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile_status"]["needs_completion"], true);
    assert!(body["tokens"]["access"].is_string());
}

#[tokio::test]
async fn login_refuses_deactivated_account() {
    let store = Arc::new(MemoryUserStore::new());
    let app = build_app(AppState::from_parts(
        store.clone(),
        Arc::new(MemoryTokenBlacklist::new()),
        Arc::new(AppConfig::for_tests()),
    ));
    register(&app, "jane@example.com").await;

    let mut user = store.find_by_email("jane@example.com").await.unwrap().unwrap();
    user.is_active = false;
    store.put(user).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/login/",
        Some(json!({ "email": "jane@example.com", "password": "Secret12" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["errors"]["non_field_errors"][0],
        "Account is deactivated. Please contact support."
    );
}

#[tokio::test]
async fn profile_requires_bearer_token() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/api/v1/auth/profile/", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["detail"].is_string());

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/v1/auth/profile/",
        None,
        Some("not-a-token"),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_update_and_completion() {
    let app = app();
    let (_, body) = register(&app, "jane@example.com").await;
    let token = access(&body);

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/auth/profile/completion/",
        None,
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile_complete"], false);
    assert_eq!(body["completion_percentage"], 50);
    assert_eq!(body["missing_fields"], json!(["given_name", "family_name"]));

    let (status, body) = send(
        &app,
        Method::PATCH,
        "/api/v1/auth/profile/update/",
        Some(json!({ "given_name": "Jane", "family_name": "Doe" })),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["full_name"], "Jane Doe");
    assert_eq!(body["profile_status"]["complete"], true);

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/auth/profile/completion/",
        None,
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile_complete"], true);
    assert_eq!(body["missing_fields"], json!([]));

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/v1/auth/profile/update/",
        Some(json!({ "license_number": "crm 999" })),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["license_number"], "CRM999");
    assert_eq!(body["profile_status"]["professional"], true);

    let (status, body) =
        send(&app, Method::GET, "/api/v1/auth/profile/", None, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile_status"]["display_name"], "Jane Doe");
    assert_eq!(body["profile_status"]["professional_title"], "Dr(a). Jane Doe");
}

#[tokio::test]
async fn mark_medical_sets_professional_flag() {
    let app = app();
    let (_, body) = register(&app, "jane@example.com").await;
    let token = access(&body);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/profile/mark-medical/",
        None,
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["is_professional"], true);
}

#[tokio::test]
async fn logout_with_and_without_refresh_token() {
    let app = app();
    let (_, body) = register(&app, "jane@example.com").await;
    let token = access(&body);
    let refresh = body["tokens"]["refresh"].as_str().unwrap().to_string();

    let (status, body) =
        send(&app, Method::POST, "/api/v1/auth/logout/", None, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/auth/logout/",
        Some(json!({ "refresh": refresh })),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // A revoked refresh token can no longer be rotated.
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/auth/token/refresh/",
        Some(json!({ "refresh": refresh })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/logout/",
        Some(json!({ "refresh": "garbage" })),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Logout failed");
}

#[tokio::test]
async fn refresh_rotates_and_rejects_reuse() {
    let app = app();
    let (_, body) = register(&app, "jane@example.com").await;
    let refresh = body["tokens"]["refresh"].as_str().unwrap().to_string();

    let (status, rotated) = send(
        &app,
        Method::POST,
        "/api/v1/auth/token/refresh/",
        Some(json!({ "refresh": refresh })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(rotated["access"].is_string());
    assert_ne!(rotated["refresh"], json!(refresh));

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/auth/token/refresh/",
        Some(json!({ "refresh": refresh })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/token/refresh/",
        Some(json!({})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["refresh"].is_array());
}

#[tokio::test]
async fn health_and_api_root() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/api/v1/auth/health/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
    assert_eq!(body["authentication"], "email_only");
    assert_eq!(body["features"]["jwt_auth"], true);

    let (status, body) = send(&app, Method::GET, "/api/v1/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["endpoints"]["auth"], "/api/v1/auth/");
}

async fn send_raw(
    app: &Router,
    uri: &str,
    content_type: Option<&str>,
    body: &str,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(Method::POST).uri(uri);
    if let Some(content_type) = content_type {
        req = req.header(header::CONTENT_TYPE, content_type);
    }
    let res = app
        .clone()
        .oneshot(req.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn malformed_bodies_get_structured_400() {
    let app = app();

    let (status, body) = send_raw(
        &app,
        "/api/v1/auth/register/",
        Some("application/json"),
        r#"{"email":"jane@example.com","password":12345678,"password_confirm":"x"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["errors"]["non_field_errors"][0].is_string());

    let (status, body) = send_raw(
        &app,
        "/api/v1/auth/login/",
        None,
        r#"{"email":"jane@example.com","password":"Secret12"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["non_field_errors"].is_array());

    let (status, _) = send_raw(
        &app,
        "/api/v1/auth/token/refresh/",
        Some("application/json"),
        "{",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
