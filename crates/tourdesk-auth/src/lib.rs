//! # Tourdesk Auth
//!
//! Principal types and bearer-token utilities for the Tourdesk API.
//!
//! - [`claims`]: token claims, roles and the resolved [`Principal`]
//! - [`jwt`]: HS256 token minting and verification
//!
//! Credential handling (signup, login, password storage) is not part of this
//! crate; tokens are minted by an external identity service or, for local
//! use, by `tourdesk-cli issue-token`.
//!
//! # Example
//!
//! ```ignore
//! use tourdesk_auth::{Role, create_access_token, verify_token};
//! use tourdesk_config::JwtConfig;
//!
//! let config = JwtConfig::from_env();
//! let token = create_access_token(user_id, Role::Admin, &config)?;
//! let principal = verify_token(&token, &config)?.principal()?;
//! ```

pub mod claims;
pub mod jwt;

// Re-export commonly used types at crate root
pub use claims::{Claims, Principal, Role};
pub use jwt::{AuthError, create_access_token, verify_token};
