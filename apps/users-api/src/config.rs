//! Configuration for Users API

use axum_helpers::JwtConfig;
use core_config::{AppInfo, ConfigError, FromEnv, app_info, env_or_default, server::ServerConfig};
use database::postgres::PostgresConfig;
use database::redis::RedisConfig;
use domain_users::AccountConfig;

pub use core_config::Environment;

/// Optional administrator created or promoted at startup.
///
/// Enabled only when both `ADMIN_EMAIL` and `ADMIN_PASSWORD` are set; `ADMIN_NAME`
/// defaults to `Administrator`.
#[derive(Clone, Debug)]
pub struct AdminBootstrap {
    pub email: String,
    pub name: String,
    pub password: String,
}

impl AdminBootstrap {
    pub fn from_env() -> Option<Self> {
        let email = env_or_default("ADMIN_EMAIL", "");
        let password = env_or_default("ADMIN_PASSWORD", "");
        if email.trim().is_empty() || password.is_empty() {
            return None;
        }
        Some(Self {
            email: email.trim().to_string(),
            name: env_or_default("ADMIN_NAME", "Administrator"),
            password,
        })
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: PostgresConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub account: AccountConfig,
    pub admin: Option<AdminBootstrap>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            app: app_info!(),
            environment: Environment::from_env(),
            server: ServerConfig::from_env()?,
            database: PostgresConfig::from_env()?,
            redis: RedisConfig::from_env()?,
            jwt: JwtConfig::from_env()?,
            account: AccountConfig::from_env()?,
            admin: AdminBootstrap::from_env(),
        })
    }
}
