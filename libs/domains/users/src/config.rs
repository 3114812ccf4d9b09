use chrono::Duration;
use core_config::{ConfigError, FromEnv, env_or_default, env_parse};

/// Settings for account flows that send links or issue one-time tokens.
#[derive(Debug, Clone)]
pub struct AccountConfig {
    /// Base URL the confirmation and reset links point at
    pub public_base_url: String,
    pub reset_token_ttl_minutes: i64,
}

impl AccountConfig {
    pub fn reset_token_ttl(&self) -> Duration {
        Duration::minutes(self.reset_token_ttl_minutes)
    }

    pub fn confirmation_link(&self, token: &str) -> String {
        format!("{}/confirm-email?token={}", self.public_base_url, token)
    }

    pub fn reset_link(&self, token: &str) -> String {
        format!("{}/reset-password?token={}", self.public_base_url, token)
    }
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:3000".to_string(),
            reset_token_ttl_minutes: 60,
        }
    }
}

impl FromEnv for AccountConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let public_base_url = env_or_default("PUBLIC_BASE_URL", "http://localhost:3000")
            .trim_end_matches('/')
            .to_string();
        let reset_token_ttl_minutes = env_parse("RESET_TOKEN_TTL_MINUTES", 60i64)?;

        if reset_token_ttl_minutes <= 0 {
            return Err(ConfigError::Invalid {
                key: "RESET_TOKEN_TTL_MINUTES".to_string(),
                details: "must be positive".to_string(),
            });
        }

        Ok(Self {
            public_base_url,
            reset_token_ttl_minutes,
        })
    }
}
