use std::sync::Arc;

use actix::Addr;
pub use telemetry::LoggerManager;

use crate::{env::Settings, scheduler::GameCenter};

pub mod env;
pub mod pubsub;
pub mod routes;
pub mod scheduler;
pub mod store;

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub game_center: Addr<GameCenter>,
    pub logger_manager: Option<Arc<LoggerManager>>,
    pub metrics_registry: prometheus::Registry,
}
