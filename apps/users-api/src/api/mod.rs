//! API routes module

pub mod health;

use axum::Router;
use axum::routing::get;
use domain_users::{PgUserRepository, UserService, handlers};

use crate::state::AppState;

/// `/auth` and `/users`, without the `/api` prefix `create_router` adds.
pub fn routes(service: UserService<PgUserRepository>) -> Router {
    Router::new()
        .nest("/auth", handlers::auth_router(service.clone()))
        .nest("/users", handlers::users_router(service))
}

pub fn ready_router(state: AppState) -> Router {
    Router::new()
        .route("/ready", get(health::ready_handler))
        .with_state(state)
}
