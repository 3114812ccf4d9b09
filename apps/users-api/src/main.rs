//! Users API: accounts and authentication, publishing user lifecycle events.

use std::sync::Arc;

use axum_helpers::JwtAuth;
use axum_helpers::server::{ShutdownCoordinator, create_production_app, health_router};
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_events::StreamUserEventPublisher;
use domain_users::{LogNotifier, PgUserRepository, UserService};
use eyre::WrapErr;
use stream_worker::{RedisStreamBackend, StreamBackend};
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

    database::postgres::run_migrations::<migration::UsersMigrator>(&db, "users_api")
        .await
        .wrap_err("Migrations failed")?;

    let backend: Arc<dyn StreamBackend> = Arc::new(RedisStreamBackend::new(redis.clone()));
    let service = UserService::new(
        PgUserRepository::new(db.clone()),
        Arc::new(StreamUserEventPublisher::new(backend)),
        Arc::new(LogNotifier),
        JwtAuth::new(&config.jwt),
        config.account.clone(),
    );

    if let Some(admin) = &config.admin {
        let user = service
            .ensure_admin(&admin.email, &admin.name, &admin.password)
            .await
            .wrap_err("Admin bootstrap failed")?;
        info!(user_id = %user.id, "Administrator account ready");
    }

    let state = AppState { db, redis };
    let router = axum_helpers::create_router::<openapi::ApiDoc>(api::routes(service))?
        .merge(health_router(config.app.clone()))
        .merge(api::ready_router(state.clone()));

    info!(port = config.server.port, "Starting Users API");

    create_production_app(router, &config.server, ShutdownCoordinator::new(), async move {
        match state.db.close().await {
            Ok(()) => info!("PostgreSQL connection closed"),
            Err(e) => error!(error = %e, "Error closing PostgreSQL"),
        }
        drop(state.redis);
    })
    .await
    .wrap_err("Server error")?;

    info!("Users API shutdown complete");
    Ok(())
}
