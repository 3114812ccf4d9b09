//! Products API: catalog REST server plus the user lifecycle stream workers.

use std::sync::Arc;

use axum_helpers::server::{ShutdownCoordinator, create_production_app, health_router};
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_products::register_user_event_consumers;
use eyre::WrapErr;
use stream_worker::{RedisStreamBackend, RetryPolicy, StreamBackend, SubscriberRegistry};
use tracing::{error, info};

mod api;
mod config;
mod openapi;
mod state;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    install_color_eyre();

    let config = Config::from_env()?;
    init_tracing(&config.environment);
    stream_worker::init_metrics().wrap_err("Failed to install Prometheus recorder")?;

    let (db, redis) = tokio::try_join!(
        async {
            database::postgres::connect_with_retry(config.database.clone(), None)
                .await
                .wrap_err("PostgreSQL connection failed")
        },
        async {
            database::redis::connect_with_retry(&config.redis, None)
                .await
                .wrap_err("Redis connection failed")
        },
    )?;

    database::postgres::run_migrations::<migration::ProductsMigrator>(&db, "products_api")
        .await
        .wrap_err("Migrations failed")?;

    let products = api::ProductsApi::new(&config, db.clone())?;

    let shutdown = ShutdownCoordinator::new();
    let backend: Arc<dyn StreamBackend> = Arc::new(RedisStreamBackend::new(redis.clone()));
    let mut registry = SubscriberRegistry::new();
    register_user_event_consumers(
        &mut registry,
        backend,
        products.service.coordinator(),
        RetryPolicy::default(),
    )?;
    info!(workers = registry.len(), "Starting user event consumers");
    let mut workers = registry.spawn_all(shutdown.subscribe());

    let state = AppState { db, redis };
    let router = axum_helpers::create_router::<openapi::ApiDoc>(api::routes(products))?
        .merge(health_router(config.app.clone()))
        .merge(api::ops_router(state.clone()));

    info!(port = config.server.port, "Starting Products API");

    create_production_app(router, &config.server, shutdown, async move {
        info!("Waiting for stream workers to drain");
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(error = %e, "Stream worker exited with error"),
                Err(e) => error!(error = %e, "Stream worker panicked"),
            }
        }

        match state.db.close().await {
            Ok(()) => info!("PostgreSQL connection closed"),
            Err(e) => error!(error = %e, "Error closing PostgreSQL"),
        }
        drop(state.redis);
    })
    .await
    .wrap_err("Server error")?;

    info!("Products API shutdown complete");
    Ok(())
}
