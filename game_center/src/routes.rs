use actix_web::{web, HttpRequest, HttpResponse};
use tracing::warn;

use crate::{
    scheduler::{GetDebugInfo, IsInitialized},
    AppState,
};

async fn metrics_route(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    if let Some(expected_token) = &state.settings.server.metrics_auth_token {
        let provided_token = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "));

        if provided_token != Some(expected_token.as_str()) {
            return HttpResponse::Unauthorized().body("Unauthorized: Invalid or missing token");
        }
    }

    match metrics::render(&state.metrics_registry) {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => HttpResponse::InternalServerError().body(format!("Metrics encode error: {}", e)),
    }
}

async fn health_route() -> HttpResponse {
    HttpResponse::Ok().body("OK")
}

/// Ready once persisted ownership has been loaded.
async fn ready_route(state: web::Data<AppState>) -> HttpResponse {
    match state.game_center.send(IsInitialized).await {
        Ok(true) => HttpResponse::Ok().body("READY"),
        Ok(false) => HttpResponse::ServiceUnavailable().body("NOT READY"),
        Err(e) => {
            warn!("GameCenter unreachable: {}", e);
            HttpResponse::ServiceUnavailable().body("NOT READY")
        }
    }
}

async fn debug_fleet_route(state: web::Data<AppState>) -> HttpResponse {
    match state.game_center.send(GetDebugInfo).await {
        Ok(body) => HttpResponse::Ok()
            .content_type("application/json")
            .body(body),
        Err(e) => HttpResponse::InternalServerError().body(format!("GameCenter unreachable: {}", e)),
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/metrics", web::get().to(metrics_route))
        .route("/health", web::get().to(health_route))
        .route("/ready", web::get().to(ready_route))
        .route("/debug/fleet", web::get().to(debug_fleet_route));
}
