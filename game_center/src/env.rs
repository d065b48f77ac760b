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
    pub scheduler: SchedulerSettings,
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
            // e.g. APP_SCHEDULER__HEARTBEAT_TIMEOUT_MS=10000
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
pub struct SchedulerSettings {
    pub load_balance_interval_ms: u64,
    pub janitor_interval_ms: u64,
    pub heartbeat_timeout_ms: u64,
    pub assignment_grace_ms: u64,
}

impl SchedulerSettings {
    pub fn to_config(&self) -> crate::scheduler::SchedulerConfig {
        crate::scheduler::SchedulerConfig {
            load_balance_interval: Duration::from_millis(self.load_balance_interval_ms),
            janitor_interval: Duration::from_millis(self.janitor_interval_ms),
            heartbeat_timeout: Duration::from_millis(self.heartbeat_timeout_ms),
            assignment_grace: Duration::from_millis(self.assignment_grace_ms),
        }
    }
}
