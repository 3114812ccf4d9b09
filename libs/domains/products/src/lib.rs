//! Products Domain
//!
//! Product catalog owned by users of the users service. Products follow their owner's
//! lifecycle: when the owner is deactivated or deleted every product is soft-deleted,
//! and restored once the owner is active again.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐
//! │  Handlers   │   │  Consumers   │  ← HTTP endpoints / user event stream
//! └──────┬──────┘   └──────┬───────┘
//!        │                 │
//! ┌──────▼──────┐   ┌──────▼───────┐
//! │   Service   │──▶│ Coordinator  │  ← Owner guards, status oracle / bulk toggles
//! └──────┬──────┘   └──────┬───────┘
//!        │                 │
//! ┌──────▼─────────────────▼───────┐
//! │          ProductStore          │  ← Data access (in-memory and Postgres)
//! └────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_products::{HttpUserStatusOracle, PgProductStore, ProductService, handlers};
//!
//! let oracle = HttpUserStatusOracle::new(UserServiceClientConfig::from_env()?)?;
//! let service = ProductService::new(PgProductStore::new(db), Arc::new(oracle));
//!
//! register_user_event_consumers(&mut registry, backend, service.coordinator(), RetryPolicy::default())?;
//! let router = handlers::router(service, jwt, service_auth);
//! ```

pub mod consumers;
pub mod coordinator;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod models;
pub mod oracle;
pub mod postgres;
pub mod repository;
pub mod service;

// Re-export commonly used types
pub use consumers::{UserLifecycleProcessor, register_user_event_consumers};
pub use coordinator::ConsistencyCoordinator;
pub use error::{ProductError, ProductResult};
pub use handlers::ApiDoc;
pub use models::{
    CreateProduct, Product, ProductFilter, SyncUserRequest, SyncUserResponse, UpdateProduct,
};
pub use oracle::{HttpUserStatusOracle, UserServiceClientConfig, UserStatusOracle};
pub use postgres::PgProductStore;
pub use repository::{InMemoryProductStore, ProductStore};
pub use service::ProductService;
