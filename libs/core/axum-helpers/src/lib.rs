//! # Axum Helpers
//!
//! Shared HTTP plumbing for the services.
//!
//! - **[`auth`]**: JWT issue/verify, bearer middleware, API-key or JWT guard
//! - **[`server`]**: router assembly, health checks, graceful shutdown
//! - **[`errors`]**: `AppError` and the `{code, error, message, details}` body
//! - **[`extractors`]**: `UuidPath`, `ValidatedJson`

pub mod auth;
pub mod errors;
pub mod extractors;
pub mod server;

pub use auth::{
    BearerToken, Caller, JwtAuth, JwtClaims, JwtConfig, ROLE_ADMIN, ROLE_USER, ServiceAuth,
    jwt_auth_middleware, service_or_user_middleware,
};

pub use server::{
    HealthCheckFuture, HealthResponse, ShutdownCoordinator, create_production_app, create_router,
    health_router, run_health_checks, shutdown_signal,
};

pub use errors::{AppError, ErrorCode, ErrorResponse};

pub use extractors::{UuidPath, ValidatedJson};
