use axum::extract::OriginalUri;
use axum::http::{HeaderValue, Method, header};
use axum::{Json, Router, middleware, routing::get};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tourdesk_core::AppError;
use tower_http::cors::CorsLayer;

use crate::logging::logging_middleware;
use crate::metrics::{metrics_middleware, metrics_routes};
use crate::middleware::errors::error_disclosure;
use crate::modules::resources::resource_router;
use crate::modules::tours::init_tours_router;
use crate::modules::users::init_users_router;
use crate::state::AppState;

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn route_not_found(OriginalUri(uri): OriginalUri) -> AppError {
    AppError::not_found(format!("Can't find {uri} on this server!"))
}

fn cors_layer(state: &AppState) -> CorsLayer {
    let allowed_origins: Vec<HeaderValue> = state
        .cors_config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}

pub fn init_router(state: AppState, metrics: Option<PrometheusHandle>) -> Router {
    let resources = state.resources.clone();

    let api = Router::new()
        .nest(
            "/tours",
            init_tours_router(resources.tours, resources.reviews.clone()),
        )
        .nest("/reviews", resource_router(resources.reviews))
        .nest("/users", init_users_router(resources.users));

    let mut router = Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api)
        .fallback(route_not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            error_disclosure,
        ))
        .with_state(state.clone());

    if let Some(handle) = metrics {
        router = router.merge(metrics_routes(handle));
    }

    router
        .layer(cors_layer(&state))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(logging_middleware))
}
