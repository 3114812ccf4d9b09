//! API routes module

pub mod health;
pub mod products;

use axum::Router;
use axum::routing::get;

use crate::state::AppState;

pub use products::ProductsApi;

/// Domain routes, without the `/api` prefix `create_router` adds.
pub fn routes(products: ProductsApi) -> Router {
    Router::new().nest("/products", products.router())
}

/// `/ready` and `/metrics`, merged beside the documented routes.
pub fn ops_router(state: AppState) -> Router {
    Router::new()
        .route("/ready", get(health::ready_handler))
        .route("/metrics", get(health::metrics_handler))
        .with_state(state)
}
