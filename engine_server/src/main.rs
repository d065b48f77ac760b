use std::{sync::Arc, time::Duration};

use actix::{Actor, System};
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use engine_server::{
    env::Settings,
    hub::ClientHub,
    node::{EngineNode, NodeConfig, NodeDeps, StopAll},
    pubsub::spawn_redis_subscriber,
    repository::PgRoomRepository,
    routes, AppState, LoggerManager,
};
use message_bus::{CircuitBreaker, Outbox, Publisher, RedisPublisher};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

/// Time processors get to write their last diff on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

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

    let mut settings = Settings::new().expect("Failed to load settings");
    if settings.engine.engine_id.is_empty() {
        settings.engine.engine_id = format!("engine-{}", Uuid::new_v4());
    }
    let engine_id = settings.engine.engine_id.clone();

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
    let outbox = Outbox::spawn(publisher.clone());
    let hub = ClientHub::new(settings.engine.client_buffer, outbox.clone()).start();
    let node = EngineNode::new(
        NodeConfig {
            engine_id: engine_id.clone(),
            heartbeat_interval: settings.engine.heartbeat_interval(),
            flush_interval: settings.engine.flush_interval(),
            history_limit: settings.engine.history_limit,
        },
        NodeDeps {
            publisher: publisher.clone(),
            repository: Arc::new(PgRoomRepository::new(db_pool)),
        },
    )
    .start();
    info!("Engine {} started", engine_id);

    spawn_redis_subscriber(
        redis_client,
        engine_id.clone(),
        node.clone(),
        hub.clone(),
        shutdown_token.clone(),
        circuit_breaker,
    );

    let app_state = AppState {
        settings: settings.clone(),
        node: node.clone(),
        hub,
        outbox,
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

    info!("Engine server is running on {}", bind_address);

    tokio::select! {
        res = &mut server => {
            error!("Server exited unexpectedly");
            return res;
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received. Flushing rooms before shutdown...");
            node.do_send(StopAll);
            shutdown_token.cancel();
            tokio::time::sleep(SHUTDOWN_GRACE).await;
            System::current().stop();
        },
    }

    server.await?;
    info!("System has shut down gracefully");

    Ok(())
}
