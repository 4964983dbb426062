mod common;

use axum::http::{Method, StatusCode};
use common::{RecordingNotifier, TestApp, setup_test_app, setup_test_app_with};
use serde_json::{Value, json};
use tourdesk_auth::Role;

async fn insert_user(app: &TestApp, fields: Value) -> String {
    app.state
        .store
        .create("users", fields.as_object().cloned().unwrap())
        .await
        .unwrap()
        .id
        .to_string()
}

#[tokio::test]
async fn test_create_user_points_to_signup() {
    let app = setup_test_app().await;
    let admin = app.token(Role::Admin);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/users",
            Some(&admin),
            Some(json!({ "name": "Leo Gillespie", "email": "leo@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
    assert_eq!(
        body["message"],
        "This route is not defined. Please use signup instead"
    );
}

#[tokio::test]
async fn test_user_routes_are_admin_only() {
    let app = setup_test_app().await;

    let (status, _) = app.get("/api/v1/users", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let guide = app.token(Role::LeadGuide);
    let (status, _) = app.get("/api/v1/users", Some(&guide)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(Method::POST, "/api/v1/users", Some(&guide), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_lists_and_updates_users() {
    let app = setup_test_app().await;
    let admin = app.token(Role::Admin);
    let id = insert_user(
        &app,
        json!({ "name": "Aarav Lynn", "email": "aarav@example.com", "active": true }),
    )
    .await;

    let (status, body) = app.get("/api/v1/users", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    let user = &body["data"]["data"][0];
    assert_eq!(user["email"], "aarav@example.com");
    assert!(user.get("active").is_none());

    let (status, body) = app
        .send(
            Method::PATCH,
            &format!("/api/v1/users/{id}"),
            Some(&admin),
            Some(json!({ "role": "guide", "active": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["data"]["role"], "guide");

    let (status, body) = app
        .send(
            Method::PATCH,
            &format!("/api/v1/users/{id}"),
            Some(&admin),
            Some(json!({ "role": "wizard" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().starts_with("Invalid input data: role must be one of"));
}

#[tokio::test]
async fn test_password_change_through_admin_api_is_rejected() {
    let app = setup_test_app().await;
    let admin = app.token(Role::Admin);
    let id = insert_user(&app, json!({ "name": "Ben Hadley", "email": "ben@example.com" })).await;

    let (status, _) = app
        .send(
            Method::PATCH,
            &format!("/api/v1/users/{id}"),
            Some(&admin),
            Some(json!({ "password": "newpass123" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_deleting_user_sends_closure_notice() {
    let app = setup_test_app().await;
    let admin = app.token(Role::Admin);
    let id = insert_user(
        &app,
        json!({ "name": "Jennifer Hardy", "email": "jennifer@example.com" }),
    )
    .await;

    let (status, _) = app
        .send(Method::DELETE, &format!("/api/v1/users/{id}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let sent = app.notifier.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, "jennifer@example.com");
    assert!(sent[0].body.starts_with("Hi Jennifer,"));
}

#[tokio::test]
async fn test_notifier_failure_surfaces_as_generic_error() {
    let app = setup_test_app_with(
        &[],
        RecordingNotifier {
            fail: true,
            ..Default::default()
        },
    )
    .await;
    let admin = app.token(Role::Admin);
    let id = insert_user(&app, json!({ "name": "Kate Morrison", "email": "kate@example.com" })).await;

    let (status, body) = app
        .send(Method::DELETE, &format!("/api/v1/users/{id}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "status": "error", "message": "Something went wrong" }));

    let (status, _) = app.get(&format!("/api/v1/users/{id}"), Some(&admin)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
