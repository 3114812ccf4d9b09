//! Connections shared by the readiness probe and shutdown cleanup.

use database::postgres::DatabaseConnection;
use database::redis::ConnectionManager;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub redis: ConnectionManager,
}
