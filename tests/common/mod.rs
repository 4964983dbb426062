use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tourdesk::router::init_router;
use tourdesk::state::AppState;
use tourdesk::utils::notifier::{Notification, Notifier};
use tourdesk_auth::{Role, create_access_token};
use tourdesk_config::AppConfig;
use tourdesk_core::DocumentStore;
use tourdesk_db::MemoryStore;
use tower::ServiceExt;
use uuid::Uuid;

/// Records notifications instead of sending them; can be told to fail.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Notification>>,
    pub fail: bool,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("smtp connection refused");
        }
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub notifier: Arc<RecordingNotifier>,
}

#[allow(dead_code)]
impl TestApp {
    pub fn token(&self, role: Role) -> String {
        self.token_for(Uuid::new_v4(), role)
    }

    pub fn token_for(&self, user_id: Uuid, role: Role) -> String {
        create_access_token(user_id, role, &self.state.jwt_config).unwrap()
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let body = match body {
            Some(body) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&body).unwrap())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, token, None).await
    }

    /// Creates a tour as a lead guide and returns its id.
    pub async fn create_tour(&self, name: &str, price: f64, difficulty: &str) -> String {
        let token = self.token(Role::LeadGuide);
        let (status, body) = self
            .send(
                Method::POST,
                "/api/v1/tours",
                Some(&token),
                Some(tour_payload(name, price, difficulty)),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["data"]["id"].as_str().unwrap().to_string()
    }

    /// Creates a review of `tour_id` as `user_id` through the nested route.
    pub async fn create_review(&self, tour_id: &str, user_id: Uuid, rating: i64) -> (StatusCode, Value) {
        let token = self.token_for(user_id, Role::User);
        self.send(
            Method::POST,
            &format!("/api/v1/tours/{tour_id}/reviews"),
            Some(&token),
            Some(json!({ "review": "Loved every minute of it", "rating": rating })),
        )
        .await
    }

    /// `(ratingsQuantity, ratingsAverage)` of a tour.
    pub async fn rating_summary(&self, tour_id: &str) -> (u64, f64) {
        let (status, body) = self.get(&format!("/api/v1/tours/{tour_id}"), None).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let tour = &body["data"]["data"];
        (
            tour["ratingsQuantity"].as_u64().unwrap(),
            tour["ratingsAverage"].as_f64().unwrap(),
        )
    }
}

#[allow(dead_code)]
pub fn tour_payload(name: &str, price: f64, difficulty: &str) -> Value {
    json!({
        "name": name,
        "duration": 5,
        "maxGroupSize": 25,
        "difficulty": difficulty,
        "price": price,
        "summary": "Breathtaking hike through the Canadian Banff National Park",
        "imageCover": "tour-1-cover.jpg",
        "startDates": ["2026-04-25", "2026-07-20"]
    })
}

#[allow(dead_code)]
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(&[], RecordingNotifier::default()).await
}

#[allow(dead_code)]
pub async fn setup_test_app_with(env: &[(&str, &str)], notifier: RecordingNotifier) -> TestApp {
    setup_test_app_on(Arc::new(MemoryStore::new()), env, notifier).await
}

/// Builds the app over a caller-supplied store.
#[allow(dead_code)]
pub async fn setup_test_app_on(
    store: Arc<dyn DocumentStore>,
    env: &[(&str, &str)],
    notifier: RecordingNotifier,
) -> TestApp {
    let env: HashMap<String, String> = env
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let config = AppConfig::from_lookup(move |key: &str| env.get(key).cloned());

    let notifier = Arc::new(notifier);
    let state = AppState::new(store, notifier.clone(), &config)
        .await
        .unwrap();

    TestApp {
        router: init_router(state.clone(), None),
        state,
        notifier,
    }
}
