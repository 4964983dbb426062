use crate::{env_lookup, parsed};
use tracing::warn;

/// Pagination defaults for list endpoints.
///
/// - `QUERY_DEFAULT_LIMIT`: page size when `limit` is absent (default 100)
/// - `QUERY_MAX_LIMIT`: cap on `limit` (default 1000, `0` disables the cap)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryConfig {
    pub default_limit: u64,
    pub max_limit: Option<u64>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: 100,
            max_limit: Some(1000),
        }
    }
}

impl QueryConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let default_limit = parsed::<u64, _>(lookup, "QUERY_DEFAULT_LIMIT")
            .filter(|n| *n > 0)
            .unwrap_or(defaults.default_limit);
        let max_limit = match parsed::<u64, _>(lookup, "QUERY_MAX_LIMIT") {
            Some(0) => None,
            Some(n) => Some(n),
            None => defaults.max_limit,
        };

        if let Some(max) = max_limit {
            if default_limit > max {
                warn!(default_limit, max_limit = max, "QUERY_DEFAULT_LIMIT exceeds QUERY_MAX_LIMIT");
            }
        }

        Self {
            default_limit,
            max_limit,
        }
    }
}
