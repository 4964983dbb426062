use crate::{env_lookup, flag, parsed};

#[derive(Clone, Debug)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_email: String,
    pub from_name: String,
}

impl EmailConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            enabled: flag(lookup, "SMTP_ENABLED").unwrap_or(false),
            smtp_host: lookup("SMTP_HOST").unwrap_or_else(|| "localhost".to_string()),
            smtp_port: parsed(lookup, "SMTP_PORT").unwrap_or(1025),
            smtp_username: lookup("SMTP_USERNAME").unwrap_or_default(),
            smtp_password: lookup("SMTP_PASSWORD").unwrap_or_default(),
            from_email: lookup("FROM_EMAIL").unwrap_or_else(|| "noreply@tourdesk.io".to_string()),
            from_name: lookup("FROM_NAME").unwrap_or_else(|| "Tourdesk".to_string()),
        }
    }
}
