use axum::{Extension, Router, routing::get};
use std::sync::Arc;

use crate::modules::resources::ResourceDescriptor;
use crate::modules::resources::controller::{delete_one, get_all, get_one, update_one};
use crate::state::AppState;

use super::controller::create_user;

pub fn init_users_router(users: Arc<ResourceDescriptor>) -> Router<AppState> {
    Router::new()
        .route("/", get(get_all).post(create_user))
        .route("/{id}", get(get_one).patch(update_one).delete(delete_one))
        .layer(Extension(users))
}
