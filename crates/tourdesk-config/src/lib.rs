//! # Tourdesk Config
//!
//! Configuration types for the Tourdesk API, one struct per concern.
//!
//! Every struct has a `from_env()` constructor that reads environment
//! variables and falls back to defaults for anything unset or unparsable,
//! plus a `from_lookup()` variant taking an arbitrary key lookup so that
//! parsing can be exercised without touching the process environment.
//!
//! - [`server`]: bind address and runtime environment
//! - [`query`]: pagination defaults and the `limit` cap
//! - [`storage`]: backend selection and storage timeout
//! - [`ratings`]: rating reconciliation sweep
//! - [`jwt`]: bearer token verification
//! - [`email`]: SMTP notification delivery
//! - [`cors`]: allowed origins
//!
//! # Example
//!
//! ```ignore
//! use tourdesk_config::AppConfig;
//!
//! dotenvy::dotenv().ok();
//! let config = AppConfig::from_env();
//! ```

pub mod cors;
pub mod email;
pub mod jwt;
pub mod query;
pub mod ratings;
pub mod server;
pub mod storage;

// Re-export commonly used types at crate root
pub use cors::CorsConfig;
pub use email::EmailConfig;
pub use jwt::JwtConfig;
pub use query::QueryConfig;
pub use ratings::RatingsConfig;
pub use server::{AppEnvironment, ServerConfig};
pub use storage::{StorageBackend, StorageConfig};

use std::str::FromStr;

/// Reads `key` through `lookup` and parses it, ignoring unparsable values.
pub(crate) fn parsed<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.trim().parse().ok())
}

/// `true`/`1` and `false`/`0`, case-insensitive.
pub(crate) fn flag<F>(lookup: &F, key: &str) -> Option<bool>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| match v.trim().to_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    })
}

pub(crate) fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub environment: AppEnvironment,
    pub query: QueryConfig,
    pub storage: StorageConfig,
    pub ratings: RatingsConfig,
    pub jwt: JwtConfig,
    pub email: EmailConfig,
    pub cors: CorsConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            server: ServerConfig::from_lookup(&lookup),
            environment: AppEnvironment::from_lookup(&lookup),
            query: QueryConfig::from_lookup(&lookup),
            storage: StorageConfig::from_lookup(&lookup),
            ratings: RatingsConfig::from_lookup(&lookup),
            jwt: JwtConfig::from_lookup(&lookup),
            email: EmailConfig::from_lookup(&lookup),
            cors: CorsConfig::from_lookup(&lookup),
        }
    }
}

#[cfg(test)]
pub(crate) fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: std::collections::HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| map.get(key).cloned()
}
