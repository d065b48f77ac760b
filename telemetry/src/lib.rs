//! Tracing setup shared by the engine and the game center.

use std::io;

use serde::Deserialize;
use tracing::Subscriber;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    fmt::{
        self,
        format::{Format, Pretty},
        MakeWriter,
    },
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter,
};

/// `[logging]` section of a service config.
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub directory: String,
    pub filename: String,
}

/// Keeps the file writer alive; dropping it flushes and closes the log file.
pub struct LoggerManager {
    _guard: WorkerGuard,
}

impl LoggerManager {
    /// Installs the global subscriber: pretty console output plus a daily
    /// rolling file. `RUST_LOG` overrides `default_level`.
    pub fn setup(logging: &LoggingSettings, default_level: &str) -> Self {
        let appender =
            RollingFileAppender::new(Rotation::DAILY, &logging.directory, &logging.filename);
        let (file_writer, guard) = tracing_appender::non_blocking(appender);

        let env_directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
        tracing_subscriber::registry()
            .with(filter_from(env_directives.as_deref(), default_level))
            .with(pretty_layer(io::stdout, true))
            .with(pretty_layer(file_writer, false))
            .init();

        tracing::info!(
            "Logging to console and {}/{}",
            logging.directory,
            logging.filename
        );
        Self { _guard: guard }
    }
}

/// `directives` when they parse, otherwise `default_level`.
fn filter_from(directives: Option<&str>, default_level: &str) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(default_level))
}

fn pretty_layer<S, W>(writer: W, ansi: bool) -> fmt::Layer<S, Pretty, Format<Pretty>, W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + 'static,
{
    fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .pretty()
}
