use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::{node::GetHostedRooms, session::ClientSession, AppState};

#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub user_id: Uuid,
}

#[get("/ws/rooms/{room_id}")]
async fn room_ws_route(
    req: HttpRequest,
    stream: web::Payload,
    path: web::Path<Uuid>,
    query: web::Query<ConnectQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let engine = &state.settings.engine;
    let session = ClientSession::new(
        path.into_inner(),
        query.user_id,
        state.hub.clone(),
        state.outbox.clone(),
        engine.ws_heartbeat_interval(),
        engine.ws_client_timeout(),
    );
    ws::start(session, &req, stream)
}

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

async fn ready_route(state: web::Data<AppState>) -> HttpResponse {
    match state.node.send(GetHostedRooms).await {
        Ok(_) => HttpResponse::Ok().body("READY"),
        Err(e) => {
            warn!("Engine node unreachable: {}", e);
            HttpResponse::ServiceUnavailable().body("NOT READY")
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(room_ws_route)
        .route("/metrics", web::get().to(metrics_route))
        .route("/health", web::get().to(health_route))
        .route("/ready", web::get().to(ready_route));
}
