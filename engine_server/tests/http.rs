mod common;

use std::{sync::Arc, time::Duration};

use actix::Actor;
use actix_web::{test, web, App};
use common::*;
use engine_server::{
    env::{
        DatabaseSettings, EngineSettings, LoggingSettings, RedisSettings, ServerSettings,
        Settings,
    },
    hub::ClientHub,
    routes, AppState,
};
use message_bus::Outbox;

fn settings(metrics_auth_token: Option<String>) -> Settings {
    Settings {
        server: ServerSettings {
            bind_address: "127.0.0.1".into(),
            port: 0,
            log_level: "info".into(),
            metrics_auth_token,
        },
        logging: LoggingSettings {
            directory: "logs".into(),
            filename: "test.log".into(),
        },
        redis: RedisSettings {
            url: "redis://127.0.0.1:6379".into(),
            circuit_breaker_threshold: 5,
            circuit_breaker_cooldown_seconds: 30,
        },
        database: DatabaseSettings {
            url: "postgres://localhost/rooms".into(),
            max_connections: 1,
        },
        engine: EngineSettings {
            engine_id: ENGINE_ID.into(),
            heartbeat_interval_ms: 50,
            flush_interval_ms: 1000,
            history_limit: 16,
            client_buffer: 8,
            ws_heartbeat_interval_seconds: 5,
            ws_client_timeout_seconds: 15,
        },
    }
}

fn app_state(h: &Harness, token: Option<String>) -> AppState {
    let registry = prometheus::Registry::new();
    metrics::register_custom_metrics(&registry).unwrap();
    AppState {
        settings: settings(token),
        node: h.node.clone(),
        hub: ClientHub::new(8, Outbox::spawn(Arc::new(h.bus.clone()))).start(),
        outbox: Outbox::spawn(Arc::new(h.bus.clone())),
        logger_manager: None,
        metrics_registry: registry,
    }
}

#[actix::test]
async fn health_and_ready() {
    let h = Harness::start(Duration::from_secs(10));
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state(&h, None)))
            .configure(routes::configure),
    )
    .await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert!(resp.status().is_success());
    let resp = test::call_service(&app, test::TestRequest::get().uri("/ready").to_request()).await;
    assert!(resp.status().is_success());
}

#[actix::test]
async fn metrics_honours_the_auth_token() {
    let h = Harness::start(Duration::from_secs(10));
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state(&h, Some("secret".into()))))
            .configure(routes::configure),
    )
    .await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/metrics").to_request()).await;
    assert_eq!(resp.status().as_u16(), 401);

    let req = test::TestRequest::get()
        .uri("/metrics")
        .insert_header(("Authorization", "Bearer secret"))
        .to_request();
    let body = test::call_and_read_body(&app, req).await;
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("active_rooms"));
}
