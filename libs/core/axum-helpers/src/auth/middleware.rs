use super::jwt::{JwtAuth, JwtClaims};
use crate::errors::AppError;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};

/// Raw bearer token of the current request, kept so it can be forwarded to other services.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

pub(crate) fn bearer_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub(crate) fn authenticate(auth: &JwtAuth, headers: &HeaderMap) -> Result<(JwtClaims, BearerToken), AppError> {
    let token = bearer_from_headers(headers).ok_or_else(|| {
        tracing::debug!("No bearer token in Authorization header");
        AppError::Unauthorized("No token provided".to_string())
    })?;

    let claims = auth.verify(token).map_err(|e| {
        tracing::debug!("JWT verification failed: {}", e);
        AppError::Unauthorized("Invalid token".to_string())
    })?;

    Ok((claims, BearerToken(token.to_string())))
}

/// Require a valid bearer token.
///
/// On success the request carries [`JwtClaims`] and [`BearerToken`] in its extensions.
pub async fn jwt_auth_middleware(
    State(auth): State<JwtAuth>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (claims, token) = authenticate(&auth, request.headers())?;
    request.extensions_mut().insert(claims);
    request.extensions_mut().insert(token);
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for JwtClaims
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<JwtClaims>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(token) = parts.extensions.get::<BearerToken>() {
            return Ok(token.clone());
        }
        bearer_from_headers(&parts.headers)
            .map(|t| BearerToken(t.to_string()))
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}
