//! Users Domain
//!
//! Account lifecycle for the users service: registration with email confirmation,
//! login issuing JWTs, password recovery, and admin-driven status changes.
//!
//! Deletes, restores and status changes are announced on the user event streams so
//! that services owning user data can follow.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  ← HTTP endpoints (/api/auth, /api/users)
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Service   │  ← Authorization, hashing, tokens, event publishing
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │ Repository  │  ← Data access (trait + in-memory and Postgres)
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Models    │  ← Entities, DTOs, enums
//! └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_users::{AccountConfig, InMemoryUserRepository, LogNotifier, UserService, handlers};
//!
//! let service = UserService::new(
//!     InMemoryUserRepository::new(),
//!     publisher,
//!     Arc::new(LogNotifier),
//!     jwt,
//!     AccountConfig::default(),
//! );
//!
//! let router = Router::new()
//!     .nest("/api/auth", handlers::auth_router(service.clone()))
//!     .nest("/api/users", handlers::users_router(service));
//! ```

pub mod config;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod models;
pub mod notifier;
pub mod password;
pub mod postgres;
pub mod repository;
pub mod service;

// Re-export commonly used types
pub use config::AccountConfig;
pub use error::{UserError, UserResult};
pub use models::{
    ChangePasswordRequest, ConfirmEmailRequest, ForgotPasswordRequest, LoginRequest,
    LoginResponse, RegisterRequest, ResetPasswordRequest, Role, SetStatusRequest,
    UpdateUserRequest, User, UserFilter, UserResponse,
};
pub use notifier::{LogNotifier, Notifier};
pub use postgres::PgUserRepository;
pub use repository::{InMemoryUserRepository, UserRepository};
pub use service::{Actor, UserService};
