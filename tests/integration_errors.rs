mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{RecordingNotifier, setup_test_app, setup_test_app_with};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tourdesk_auth::Role;
use tower::ServiceExt;

#[tokio::test]
async fn test_health() {
    let app = setup_test_app().await;
    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_unknown_route_names_the_url() {
    let app = setup_test_app().await;

    let (status, body) = app.get("/nowhere", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body,
        json!({ "status": "fail", "message": "Can't find /nowhere on this server!" })
    );

    let (status, body) = app.get("/api/v1/bookings?page=2", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body["message"],
        "Can't find /api/v1/bookings?page=2 on this server!"
    );
}

#[tokio::test]
async fn test_restricted_mode_hides_diagnostics() {
    let app = setup_test_app().await;
    let (status, body) = app.get("/api/v1/tours/123", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "status": "fail", "message": "Invalid id: 123." }));
}

#[tokio::test]
async fn test_diagnostic_mode_exposes_error_detail() {
    let app = setup_test_app_with(&[("APP_ENV", "development")], RecordingNotifier::default()).await;

    let (status, body) = app.get("/api/v1/tours/123", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "fail");
    assert_eq!(body["message"], "Invalid id: 123.");
    assert_eq!(body["error"]["kind"], "InvalidIdentifier");
    assert_eq!(body["error"]["statusCode"], 400);
    assert_eq!(body["error"]["isOperational"], true);
    assert!(body["stack"].is_string());
}

#[tokio::test]
async fn test_diagnostic_mode_reveals_internal_failures() {
    let app = setup_test_app_with(
        &[("APP_ENV", "development")],
        RecordingNotifier {
            fail: true,
            ..Default::default()
        },
    )
    .await;
    let admin = app.token(Role::Admin);
    let id = app
        .state
        .store
        .create(
            "users",
            json!({ "name": "Max Smith", "email": "max@example.com" })
                .as_object()
                .cloned()
                .unwrap(),
        )
        .await
        .unwrap()
        .id;

    let (status, body) = app
        .send(
            axum::http::Method::DELETE,
            &format!("/api/v1/users/{id}"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
    assert_eq!(body["error"]["isOperational"], false);
    let chain: Vec<&str> = body["error"]["chain"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c.as_str().unwrap())
        .collect();
    assert!(chain.contains(&"smtp connection refused"));
}

async fn raw_get(router: axum::Router, uri: &str, authorization: &str) -> (StatusCode, Value) {
    let response = router
        .oneshot(
            Request::builder()
                .uri(uri)
                .header("authorization", authorization)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_malformed_authorization_header_is_rejected_on_public_routes() {
    let app = setup_test_app().await;

    let (status, body) = raw_get(app.router.clone(), "/api/v1/tours", "Token abc").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid authorization header format");

    let (status, body) = raw_get(app.router.clone(), "/api/v1/tours", "Bearer not.a.jwt").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid token. Please log in again");
}

#[tokio::test]
async fn test_missing_content_type_is_bad_request() {
    let app = setup_test_app().await;
    let token = app.token(Role::Admin);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/tours")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::from(r#"{"name":"The Forest Hiker"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["message"], "Missing 'Content-Type: application/json' header");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = setup_test_app().await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "req-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-42");

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}
