use std::sync::Arc;

use actix::{Actor, System};
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use game_center::{
    env::Settings, pubsub::spawn_redis_subscriber, routes, scheduler::GameCenter,
    store::PgOwnershipStore, AppState, LoggerManager,
};
use message_bus::{CircuitBreaker, Publisher, RedisPublisher};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

async fn connect_infrastructure(
    settings: &Settings,
) -> anyhow::Result<(redis::Client, redis::aio::ConnectionManager, PgPool)> {
    let redis_client = redis::Client::open(settings.redis.url.clone())
        .context("invalid Redis url")?;
    let redis_conn_manager = redis::aio::ConnectionManager::new(redis_client.clone())
        .await
        .context("Redis connection manager")?;
    info!("Redis connection established: {}", settings.redis.url);

    let db_pool = PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await
        .context("Postgres pool")?;
    info!("Database connection pool created");

    Ok((redis_client, redis_conn_manager, db_pool))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();

    let settings = Settings::new().expect("Failed to load settings");
    let logger_manager = Arc::new(LoggerManager::setup(&settings.logging, &settings.server.log_level));

    let (redis_client, redis_conn_manager, db_pool) = connect_infrastructure(&settings)
        .await
        .expect("Failed to connect to Redis or Postgres");

    let metrics_registry = prometheus::Registry::new();
    metrics::register_custom_metrics(&metrics_registry)
        .expect("Failed to register custom metrics");

    let shutdown_token = CancellationToken::new();
    let circuit_breaker = Arc::new(CircuitBreaker::new(
        settings.redis.circuit_breaker_threshold,
        settings.redis.circuit_breaker_cooldown_seconds,
    ));

    let publisher: Arc<dyn Publisher> = Arc::new(RedisPublisher::new(redis_conn_manager));
    let game_center = GameCenter::new(
        settings.scheduler.to_config(),
        publisher,
        Arc::new(PgOwnershipStore::new(db_pool)),
    )
    .start();

    spawn_redis_subscriber(
        redis_client,
        game_center.clone(),
        shutdown_token.clone(),
        circuit_breaker,
    );

    let app_state = AppState {
        settings: settings.clone(),
        game_center,
        logger_manager: Some(logger_manager),
        metrics_registry,
    };

    let bind_address = format!("{}:{}", settings.server.bind_address, settings.server.port);
    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .configure(routes::configure)
    })
    .bind(&bind_address)?
    .run();

    info!("GameCenter is running on {}", bind_address);

    tokio::select! {
        res = &mut server => {
            error!("Server exited unexpectedly");
            return res;
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received. Shutting down...");
            shutdown_token.cancel();
            System::current().stop();
        },
    }

    server.await?;
    info!("System has shut down gracefully");

    Ok(())
}
