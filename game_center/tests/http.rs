mod common;

use std::time::Duration;

use actix_web::{test, web, App};
use common::*;
use game_center::{
    env::{
        DatabaseSettings, LoggingSettings, RedisSettings, SchedulerSettings, ServerSettings,
        Settings,
    },
    routes,
    scheduler::HandleRoomCreated,
    AppState,
};
use uuid::Uuid;

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
        scheduler: SchedulerSettings {
            load_balance_interval_ms: 3_600_000,
            janitor_interval_ms: 3_600_000,
            heartbeat_timeout_ms: 10_000,
            assignment_grace_ms: 10_000,
        },
    }
}

fn app_state(h: &Harness, token: Option<String>) -> AppState {
    let registry = prometheus::Registry::new();
    metrics::register_custom_metrics(&registry).unwrap();
    AppState {
        settings: settings(token),
        game_center: h.game_center.clone(),
        logger_manager: None,
        metrics_registry: registry,
    }
}

#[actix::test]
async fn health_and_ready() {
    let h = Harness::start(manual_config(Duration::from_secs(10)));
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
async fn debug_fleet_lists_pending_rooms() {
    let h = Harness::start(manual_config(Duration::from_secs(10)));
    let room_id = Uuid::new_v4();
    h.game_center.send(HandleRoomCreated { room_id }).await.unwrap();
    h.beat("e1", true).await;

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state(&h, None)))
            .configure(routes::configure),
    )
    .await;

    let req = test::TestRequest::get().uri("/debug/fleet").to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["initialized"], true);
    assert_eq!(body["pending_count"], 1);
    assert_eq!(body["pending"][0], room_id.to_string());
    assert_eq!(body["engines"][0]["engine_id"], "e1");
    assert_eq!(body["engines"][0]["live"], true);
}

#[actix::test]
async fn metrics_requires_the_configured_token() {
    let h = Harness::start(manual_config(Duration::from_secs(10)));
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state(&h, Some("secret".into()))))
            .configure(routes::configure),
    )
    .await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/metrics").to_request()).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get()
        .uri("/metrics")
        .insert_header(("Authorization", "Bearer secret"))
        .to_request();
    let body = test::call_and_read_body(&app, req).await;
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("pending_rooms"));
}
