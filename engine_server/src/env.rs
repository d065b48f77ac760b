use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
pub use telemetry::LoggingSettings;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub redis: RedisSettings,
    pub database: DatabaseSettings,
    pub engine: EngineSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        println!("Loading configuration for RUN_MODE: {}", &run_mode);

        let s = Config::builder()
            .add_source(
                File::with_name(&format!("config/{}", run_mode))
                    .format(FileFormat::Toml)
                    .required(true),
            )
            // e.g. APP_ENGINE__ENGINE_ID=engine-a
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub bind_address: String,
    pub port: u16,
    pub log_level: String,
    pub metrics_auth_token: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisSettings {
    pub url: String,
    pub circuit_breaker_threshold: u64,
    pub circuit_breaker_cooldown_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineSettings {
    #[serde(default)]
    pub engine_id: String,
    pub heartbeat_interval_ms: u64,
    pub flush_interval_ms: u64,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    pub client_buffer: usize,
    pub ws_heartbeat_interval_seconds: u64,
    pub ws_client_timeout_seconds: u64,
}

fn default_history_limit() -> usize {
    room_core::geometry::DEFAULT_HISTORY_LIMIT
}

impl EngineSettings {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn ws_heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.ws_heartbeat_interval_seconds)
    }

    pub fn ws_client_timeout(&self) -> Duration {
        Duration::from_secs(self.ws_client_timeout_seconds)
    }
}
