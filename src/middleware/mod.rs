//! Middleware and extractors for cross-cutting request concerns.
//!
//! - [`auth`]: bearer-token extractor and per-operation access rules
//! - [`errors`]: diagnostic re-rendering of error responses
//!
//! # Example
//!
//! ```ignore
//! use crate::middleware::auth::{AccessRule, AuthUser, authorize};
//!
//! async fn handler(user: Option<AuthUser>) -> Result<impl IntoResponse, AppError> {
//!     authorize(AccessRule::Authenticated, user.as_ref())?;
//!     // ...
//! }
//! ```

pub mod auth;
pub mod errors;
