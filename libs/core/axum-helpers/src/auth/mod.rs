//! Bearer-token authentication and service-to-service credentials.
//!
//! - [`JwtAuth`] issues and verifies HS256 tokens.
//! - [`jwt_auth_middleware`] guards user routes and puts [`JwtClaims`] plus the raw
//!   [`BearerToken`] into request extensions.
//! - [`service_or_user_middleware`] accepts either an `X-API-Key` matching the configured
//!   service key or a valid bearer token, recording the [`Caller`].
//!
//! ```ignore
//! let auth = JwtAuth::new(&JwtConfig::from_env()?);
//!
//! let protected = Router::new()
//!     .route("/api/products", post(create))
//!     .layer(axum::middleware::from_fn_with_state(auth, jwt_auth_middleware));
//! ```

pub mod config;
pub mod jwt;
pub mod middleware;
pub mod service;

pub use config::JwtConfig;
pub use jwt::{JwtAuth, JwtClaims, ROLE_ADMIN, ROLE_USER};
pub use middleware::{BearerToken, jwt_auth_middleware};
pub use service::{API_KEY_HEADER, Caller, ServiceAuth, service_or_user_middleware};
