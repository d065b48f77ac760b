use std::sync::Arc;

use actix::Addr;
use message_bus::Outbox;
pub use telemetry::LoggerManager;

use crate::{env::Settings, hub::ClientHub, node::EngineNode};

pub mod env;
pub mod hub;
pub mod node;
pub mod processor;
pub mod protocol;
pub mod pubsub;
pub mod repository;
pub mod routes;
pub mod session;

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub node: Addr<EngineNode>,
    pub hub: Addr<ClientHub>,
    /// Client actions go out through here, in order per process.
    pub outbox: Outbox,
    pub logger_manager: Option<Arc<LoggerManager>>,
    pub metrics_registry: prometheus::Registry,
}
