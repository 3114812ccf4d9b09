//! User Status Oracle
//!
//! Before a product is created, the product service asks the users service whether the
//! owner is still active, forwarding the caller's own bearer token.

use async_trait::async_trait;
use core_config::{ConfigError, FromEnv, env_or_default, env_parse};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::{ProductError, ProductResult};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStatusOracle: Send + Sync {
    /// `Ok(())` only when the users service confirms `user_id` is active.
    async fn ensure_active(&self, user_id: Uuid, bearer: &str) -> ProductResult<()>;
}

/// Where and how patiently to reach the users service.
#[derive(Debug, Clone)]
pub struct UserServiceClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl UserServiceClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl FromEnv for UserServiceClientConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_url = env_or_default("USER_SERVICE_URL", "http://localhost:8081");
        let timeout_secs: u64 = env_parse("USER_SERVICE_TIMEOUT_SECS", 5)?;

        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "USER_SERVICE_TIMEOUT_SECS".to_string(),
                details: "must be positive".to_string(),
            });
        }

        Ok(Self::new(base_url).with_timeout(Duration::from_secs(timeout_secs)))
    }
}

/// The slice of the users service's user representation this service relies on.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserStatusView {
    is_active: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SetStatusBody {
    is_active: bool,
}

/// HTTP client for the users service.
#[derive(Clone)]
pub struct HttpUserStatusOracle {
    client: Client,
    base_url: String,
}

impl HttpUserStatusOracle {
    pub fn new(config: UserServiceClientConfig) -> ProductResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProductError::Internal(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url,
        })
    }

    fn user_url(&self, user_id: Uuid) -> String {
        format!("{}/api/users/{}", self.base_url, user_id)
    }

    /// Push a status change to the users service on behalf of `bearer`.
    #[instrument(skip(self, bearer))]
    pub async fn update_user_status(
        &self,
        user_id: Uuid,
        is_active: bool,
        bearer: &str,
    ) -> ProductResult<()> {
        let response = self
            .client
            .put(format!("{}/status", self.user_url(user_id)))
            .bearer_auth(bearer)
            .json(&SetStatusBody { is_active })
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED => Err(ProductError::Unauthorized(
                "Users service rejected the credential".to_string(),
            )),
            StatusCode::FORBIDDEN => Err(ProductError::Forbidden),
            s => Err(ProductError::AccountUnavailable(format!(
                "Users service answered {} for user {}",
                s, user_id
            ))),
        }
    }
}

fn transport_error(err: reqwest::Error) -> ProductError {
    warn!(error = %err, timeout = err.is_timeout(), "Users service unreachable");
    ProductError::UpstreamUnavailable("Users service is unreachable".to_string())
}

#[async_trait]
impl UserStatusOracle for HttpUserStatusOracle {
    #[instrument(skip(self, bearer))]
    async fn ensure_active(&self, user_id: Uuid, bearer: &str) -> ProductResult<()> {
        let response = self
            .client
            .get(self.user_url(user_id))
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            debug!(%status, "Users service refused status lookup");
            return Err(ProductError::AccountUnavailable(format!(
                "User {} could not be verified",
                user_id
            )));
        }

        let body = response.bytes().await.map_err(transport_error)?;
        match serde_json::from_slice::<UserStatusView>(&body) {
            Ok(UserStatusView { is_active: true }) => Ok(()),
            Ok(_) => Err(ProductError::AccountUnavailable(format!(
                "User {} is inactive",
                user_id
            ))),
            Err(e) => {
                warn!(error = %e, "Malformed user status response");
                Err(ProductError::AccountUnavailable(format!(
                    "User {} could not be verified",
                    user_id
                )))
            }
        }
    }
}
