use crate::{env_lookup, parsed};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

/// Storage selection.
///
/// - `STORAGE_BACKEND`: `memory` (default) or `postgres`
/// - `DATABASE_URL`: required by the `postgres` backend
/// - `STORAGE_TIMEOUT_MS`: bound on every storage call (default 10000)
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub database_url: Option<String>,
    pub timeout: Duration,
}

impl StorageConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match lookup("STORAGE_BACKEND")
            .map(|v| v.trim().to_lowercase())
            .as_deref()
        {
            Some("postgres") | Some("postgresql") => StorageBackend::Postgres,
            _ => StorageBackend::Memory,
        };

        Self {
            backend,
            database_url: lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()),
            timeout: Duration::from_millis(
                parsed::<u64, _>(lookup, "STORAGE_TIMEOUT_MS")
                    .filter(|ms| *ms > 0)
                    .unwrap_or(10_000),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup_from;

    #[test]
    fn test_defaults() {
        let config = StorageConfig::from_lookup(&|_: &str| None);
        assert_eq!(config.backend, StorageBackend::Memory);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_postgres_backend() {
        let config = StorageConfig::from_lookup(&lookup_from(&[
            ("STORAGE_BACKEND", "Postgres"),
            ("DATABASE_URL", "postgres://localhost/tourdesk"),
            ("STORAGE_TIMEOUT_MS", "250"),
        ]));
        assert_eq!(config.backend, StorageBackend::Postgres);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/tourdesk"));
        assert_eq!(config.timeout, Duration::from_millis(250));
    }
}
