use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{header, request::Parts},
};
use tourdesk_auth::{AuthError, Principal, Role, verify_token};
use tourdesk_core::AppError;

use crate::state::AppState;

/// Who may perform an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRule {
    Public,
    Authenticated,
    Roles(&'static [Role]),
}

/// Extractor for the authenticated caller.
///
/// Rejects with 401 when the `Authorization` header is present but malformed
/// or carries an invalid or expired token. Use `Option<AuthUser>` on routes
/// that are reachable anonymously.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Principal);

impl AuthUser {
    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        self.0.has_any_role(roles)
    }
}

fn auth_error(err: AuthError) -> AppError {
    match err {
        AuthError::Encoding(_) => AppError::internal(err),
        other => AppError::unauthorized(other.to_string()),
    }
}

fn bearer_token(parts: &Parts) -> Result<Option<&str>, AppError> {
    let Some(value) = parts.headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::unauthorized("Invalid authorization header format"))?;

    Ok(Some(token))
}

fn authenticate(parts: &Parts, state: &AppState) -> Result<Option<AuthUser>, AppError> {
    let Some(token) = bearer_token(parts)? else {
        return Ok(None);
    };

    let principal = verify_token(token, &state.jwt_config)
        .and_then(|claims| claims.principal())
        .map_err(auth_error)?;

    Ok(Some(AuthUser(principal)))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state)?.ok_or_else(|| {
            AppError::unauthorized("You are not logged in. Please log in to get access")
        })
    }
}

impl OptionalFromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        authenticate(parts, state)
    }
}

/// Checks `rule` against the (possibly anonymous) caller.
pub fn authorize(rule: AccessRule, user: Option<&AuthUser>) -> Result<(), AppError> {
    match (rule, user) {
        (AccessRule::Public, _) => Ok(()),
        (_, None) => Err(AppError::unauthorized(
            "You are not logged in. Please log in to get access",
        )),
        (AccessRule::Authenticated, Some(_)) => Ok(()),
        (AccessRule::Roles(roles), Some(user)) if user.has_any_role(roles) => Ok(()),
        (AccessRule::Roles(_), Some(_)) => Err(AppError::forbidden(
            "You do not have permission to perform this action",
        )),
    }
}
