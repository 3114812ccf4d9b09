use super::config::JwtConfig;
use crate::errors::AppError;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub const ROLE_USER: &str = "User";
pub const ROLE_ADMIN: &str = "Admin";

/// Claims carried by access tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// User id
    pub sub: String,
    pub email: String,
    pub role: String,
    pub email_confirmed: bool,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

impl JwtClaims {
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| AppError::Unauthorized("Invalid token subject".to_string()))
    }

    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

/// HS256 token issuer and verifier.
#[derive(Clone)]
pub struct JwtAuth {
    inner: Arc<Keys>,
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    ttl_secs: i64,
}

impl JwtAuth {
    pub fn new(config: &JwtConfig) -> Self {
        tracing::info!(issuer = %config.issuer, "JWT auth initialized");
        Self {
            inner: Arc::new(Keys {
                encoding: EncodingKey::from_secret(config.secret.as_bytes()),
                decoding: DecodingKey::from_secret(config.secret.as_bytes()),
                issuer: config.issuer.clone(),
                ttl_secs: config.ttl_secs,
            }),
        }
    }

    pub fn ttl_secs(&self) -> i64 {
        self.inner.ttl_secs
    }

    pub fn issue(
        &self,
        user_id: Uuid,
        email: &str,
        role: &str,
        email_confirmed: bool,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = JwtClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            role: role.to_string(),
            email_confirmed,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.inner.ttl_secs)).timestamp(),
            iss: self.inner.issuer.clone(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.inner.encoding)
    }

    /// Check signature, expiry and issuer.
    pub fn verify(&self, token: &str) -> Result<JwtClaims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.inner.issuer.as_str()]);
        decode::<JwtClaims>(token, &self.inner.decoding, &validation).map(|data| data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth(issuer: &str, ttl: i64) -> JwtAuth {
        let config = JwtConfig::new("this-is-a-valid-secret-with-32-chars!")
            .unwrap()
            .with_issuer(issuer)
            .with_ttl_secs(ttl);
        JwtAuth::new(&config)
    }

    #[test]
    fn test_issue_then_verify() {
        let auth = auth("users-api", 600);
        let id = Uuid::new_v4();
        let token = auth.issue(id, "a@example.com", ROLE_ADMIN, true).unwrap();

        let claims = auth.verify(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), id);
        assert!(claims.is_admin());
        assert!(claims.email_confirmed);
        assert_eq!(claims.exp - claims.iat, 600);
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let token = auth("someone-else", 600)
            .issue(Uuid::new_v4(), "a@example.com", ROLE_USER, true)
            .unwrap();
        assert!(auth("users-api", 600).verify(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let auth = auth("users-api", -600);
        let token = auth
            .issue(Uuid::new_v4(), "a@example.com", ROLE_USER, true)
            .unwrap();
        assert!(auth.verify(&token).is_err());
    }

    #[test]
    fn test_non_uuid_subject() {
        let claims = JwtClaims {
            sub: "not-a-uuid".into(),
            email: String::new(),
            role: ROLE_USER.into(),
            email_confirmed: false,
            iat: 0,
            exp: 0,
            iss: String::new(),
        };
        assert!(claims.user_id().is_err());
    }
}
