//! Products routes wired to PostgreSQL and the user-service oracle.

use std::sync::Arc;

use axum::Router;
use axum_helpers::{JwtAuth, ServiceAuth};
use database::postgres::DatabaseConnection;
use domain_products::{HttpUserStatusOracle, PgProductStore, ProductService, handlers};

use crate::config::Config;

/// Everything the products router needs, built once at startup.
#[derive(Clone)]
pub struct ProductsApi {
    pub service: ProductService<PgProductStore>,
    pub jwt: JwtAuth,
    pub service_auth: ServiceAuth,
}

impl ProductsApi {
    pub fn new(config: &Config, db: DatabaseConnection) -> eyre::Result<Self> {
        let oracle = HttpUserStatusOracle::new(config.user_service.clone())?;
        let service = ProductService::new(PgProductStore::new(db), Arc::new(oracle));
        let jwt = JwtAuth::new(&config.jwt);
        let service_auth = ServiceAuth::new(jwt.clone(), config.api_key.key.clone());

        Ok(Self {
            service,
            jwt,
            service_auth,
        })
    }

    pub fn router(self) -> Router {
        handlers::router(self.service, self.jwt, self.service_auth)
    }
}
