//! PostgreSQL pool, migrations and health probe.

mod config;
mod connector;

pub use config::PostgresConfig;
pub use connector::{check_health, connect, connect_with_retry, run_migrations};

pub use sea_orm::{DatabaseConnection, DbErr};
pub use sea_orm_migration::MigratorTrait;
