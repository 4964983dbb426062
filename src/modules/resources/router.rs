use axum::{Extension, Router, routing::get};
use std::sync::Arc;

use crate::state::AppState;

use super::controller::{create_one, delete_one, get_all, get_one, update_one};
use super::model::ResourceDescriptor;

/// Collection and item routes for one resource.
pub fn resource_router(resource: Arc<ResourceDescriptor>) -> Router<AppState> {
    Router::new()
        .route("/", get(get_all).post(create_one))
        .route("/{id}", get(get_one).patch(update_one).delete(delete_one))
        .layer(Extension(resource))
}

/// Collection routes of a resource nested under its parent's item route.
pub fn nested_resource_router(resource: Arc<ResourceDescriptor>) -> Router<AppState> {
    Router::new()
        .route("/", get(get_all).post(create_one))
        .layer(Extension(resource))
}
