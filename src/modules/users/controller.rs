use tracing::instrument;

use tourdesk_core::AppError;

use crate::middleware::auth::{AccessRule, AuthUser, authorize};
use tourdesk_auth::Role;

/// Accounts are created through signup, never through the admin API.
#[instrument]
pub async fn create_user(user: Option<AuthUser>) -> AppError {
    if let Err(err) = authorize(AccessRule::Roles(&[Role::Admin]), user.as_ref()) {
        return err;
    }
    AppError::internal_operational("This route is not defined. Please use signup instead")
}
