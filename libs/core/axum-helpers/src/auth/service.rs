//! Routes callable by trusted services (via API key) as well as signed-in users.

use super::jwt::{JwtAuth, JwtClaims};
use super::middleware::authenticate;
use crate::errors::AppError;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Who passed [`service_or_user_middleware`].
#[derive(Debug, Clone)]
pub enum Caller {
    Service,
    User(JwtClaims),
}

#[derive(Clone)]
pub struct ServiceAuth {
    jwt: JwtAuth,
    api_key: Option<Arc<str>>,
}

impl ServiceAuth {
    /// An empty or absent key disables the service credential; only bearer tokens pass then.
    pub fn new(jwt: JwtAuth, api_key: Option<String>) -> Self {
        Self {
            jwt,
            api_key: api_key.filter(|k| !k.is_empty()).map(Arc::from),
        }
    }

    fn api_key_matches(&self, presented: &[u8]) -> bool {
        match &self.api_key {
            Some(expected) => expected.as_bytes().ct_eq(presented).into(),
            None => false,
        }
    }
}

/// Accept a matching `X-API-Key` or a valid bearer token, in that order.
pub async fn service_or_user_middleware(
    State(auth): State<ServiceAuth>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let caller = match request.headers().get(API_KEY_HEADER) {
        Some(key) if auth.api_key_matches(key.as_bytes()) => Caller::Service,
        Some(_) => {
            tracing::warn!("Rejected request with invalid API key");
            return Err(AppError::Unauthorized("Invalid API key".to_string()));
        }
        None => {
            let (claims, token) = authenticate(&auth.jwt, request.headers())?;
            request.extensions_mut().insert(token);
            Caller::User(claims)
        }
    };

    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Caller>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}
