use crate::{env_lookup, parsed};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parsed(lookup, "PORT").unwrap_or(3000),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Runtime environment from `APP_ENV`. Only `development` enables
/// diagnostic error bodies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AppEnvironment {
    Development,
    #[default]
    Production,
}

impl AppEnvironment {
    pub fn from_env() -> Self {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup("APP_ENV").map(|v| v.trim().to_lowercase()).as_deref() {
            Some("development") => AppEnvironment::Development,
            _ => AppEnvironment::Production,
        }
    }

    pub fn is_development(&self) -> bool {
        matches!(self, AppEnvironment::Development)
    }
}
