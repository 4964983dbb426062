use axum::{Extension, Router, routing::get};
use std::sync::Arc;

use crate::modules::resources::controller::{
    create_one, delete_one, get_all, get_one, update_one,
};
use crate::modules::resources::{ResourceDescriptor, nested_resource_router};
use crate::state::AppState;

use super::controller::top_five_cheap;

pub fn init_tours_router(
    tours: Arc<ResourceDescriptor>,
    reviews: Arc<ResourceDescriptor>,
) -> Router<AppState> {
    Router::new()
        .route("/", get(get_all).post(create_one))
        .route("/top-5-cheap", get(top_five_cheap))
        .route("/{id}", get(get_one).patch(update_one).delete(delete_one))
        .layer(Extension(tours))
        .nest("/{id}/reviews", nested_resource_router(reviews))
}
