pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use crate::core::{config::Settings, redis::RedisHandle, state::AppState, telemetry};
use crate::repositories::postgres::PgAcademicStore;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;

    let redis = RedisHandle::new(settings.redis().redis_url());
    if let Err(err) = redis.connect().await {
        tracing::error!(error = %err, "Failed to connect to Redis; rate limiting disabled");
    } else {
        tracing::info!("Redis connected successfully");
    }

    let store = Arc::new(PgAcademicStore::new(db_pool.clone()));
    let state = AppState::new(settings, store, redis.clone());

    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        max_concurrency = state.settings().reports().max_concurrency,
        "Campus Grades API listening"
    );

    let engine = state.engine().clone();
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            core::shutdown::shutdown_signal().await;
            engine.shutdown();
        })
        .await;

    redis.disconnect().await;
    tracing::info!("Redis disconnected");
    db_pool.close().await;

    result?;

    Ok(())
}
