use lazy_static::lazy_static;
use prometheus::{
    opts, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

lazy_static! {
    // Created unregistered; each service registers them into its own
    // Registry at start-up.

    /// Actions applied by a room state machine, by action type.
    pub static ref ACTIONS_APPLIED_TOTAL: IntCounterVec =
        IntCounterVec::new(Opts::new("actions_applied_total", "Actions applied to room state"), &["type"])
            .unwrap();

    /// Actions rejected by validation, by reason.
    pub static ref ACTIONS_REJECTED_TOTAL: IntCounterVec =
        IntCounterVec::new(Opts::new("actions_rejected_total", "Actions rejected by room validation"), &["reason"])
            .unwrap();

    pub static ref ACTION_APPLY_DURATION_SECONDS: Histogram =
        Histogram::with_opts(HistogramOpts::new(
            "action_apply_duration_seconds",
            "Time spent applying and publishing one action (seconds)"
        ).buckets(vec![0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25])).unwrap();

    /// Frames that could not be parsed into an action.
    pub static ref ABNORMAL_UNKNOWN_TYPE_TOTAL: IntCounter =
        IntCounter::with_opts(opts!("abnormal_unknown_type_total", "Unparseable or unknown action frames received")).unwrap();

    /// Rooms hosted by this engine.
    pub static ref ACTIVE_ROOMS: IntGauge =
        IntGauge::with_opts(opts!("active_rooms", "Rooms currently hosted by this engine")).unwrap();

    /// Active websocket connections.
    pub static ref ACTIVE_WS_CONNECTIONS: IntGauge =
        IntGauge::with_opts(opts!("active_ws_connections", "Number of active websocket connections")).unwrap();

    pub static ref CLIENT_FRAMES_DROPPED_TOTAL: IntCounter =
        IntCounter::with_opts(opts!("client_frames_dropped_total", "Frames dropped because a client buffer was full")).unwrap();

    pub static ref DIFF_RECORDS_FLUSHED_TOTAL: IntCounter =
        IntCounter::with_opts(opts!("diff_records_flushed_total", "Participant records written to storage")).unwrap();

    pub static ref DIFF_FLUSH_FAILURES_TOTAL: IntCounter =
        IntCounter::with_opts(opts!("diff_flush_failures_total", "Diff flushes that failed and were re-queued")).unwrap();

    pub static ref PUBLISH_FAILURES_TOTAL: IntCounter =
        IntCounter::with_opts(opts!("publish_failures_total", "Bus messages that could not be published")).unwrap();

    pub static ref REDIS_CONNECTION_FAILURES_TOTAL: IntCounter =
        IntCounter::with_opts(opts!("redis_connection_failures_total", "Redis connection failures")).unwrap();

    /// Total times circuit breaker opened
    pub static ref CIRCUIT_BREAKER_OPEN_TOTAL: IntCounter =
        IntCounter::with_opts(opts!(
            "circuit_breaker_open_total",
            "Total times Redis circuit breaker opened due to failures"
        ))
        .unwrap();

    // Scheduler

    pub static ref PENDING_ROOMS: IntGauge =
        IntGauge::with_opts(opts!("pending_rooms", "Rooms waiting for an engine")).unwrap();

    pub static ref LIVE_ENGINES: IntGauge =
        IntGauge::with_opts(opts!("live_engines", "Engines with a fresh heartbeat")).unwrap();

    pub static ref ROOMS_ASSIGNED_TOTAL: IntCounter =
        IntCounter::with_opts(opts!("rooms_assigned_total", "Room assignments issued")).unwrap();

    pub static ref ROOMS_REQUEUED_TOTAL: IntCounter =
        IntCounter::with_opts(opts!("rooms_requeued_total", "Rooms returned to the pending queue")).unwrap();

    pub static ref ENGINES_EVICTED_TOTAL: IntCounter =
        IntCounter::with_opts(opts!("engines_evicted_total", "Engines evicted for missing heartbeats")).unwrap();

    pub static ref ASSIGNMENT_PUBLISH_FAILURES_TOTAL: IntCounter =
        IntCounter::with_opts(opts!("assignment_publish_failures_total", "Assignment commands that failed to publish")).unwrap();
}

/// Registers all custom metrics defined in this crate to the given registry.
///
/// Each service calls this once during start-up.
pub fn register_custom_metrics(registry: &Registry) -> Result<(), prometheus::Error> {
    registry.register(Box::new(ACTIONS_APPLIED_TOTAL.clone()))?;
    registry.register(Box::new(ACTIONS_REJECTED_TOTAL.clone()))?;
    registry.register(Box::new(ACTION_APPLY_DURATION_SECONDS.clone()))?;
    registry.register(Box::new(ABNORMAL_UNKNOWN_TYPE_TOTAL.clone()))?;
    registry.register(Box::new(ACTIVE_ROOMS.clone()))?;
    registry.register(Box::new(ACTIVE_WS_CONNECTIONS.clone()))?;
    registry.register(Box::new(CLIENT_FRAMES_DROPPED_TOTAL.clone()))?;
    registry.register(Box::new(DIFF_RECORDS_FLUSHED_TOTAL.clone()))?;
    registry.register(Box::new(DIFF_FLUSH_FAILURES_TOTAL.clone()))?;
    registry.register(Box::new(PUBLISH_FAILURES_TOTAL.clone()))?;
    registry.register(Box::new(REDIS_CONNECTION_FAILURES_TOTAL.clone()))?;
    registry.register(Box::new(CIRCUIT_BREAKER_OPEN_TOTAL.clone()))?;

    registry.register(Box::new(PENDING_ROOMS.clone()))?;
    registry.register(Box::new(LIVE_ENGINES.clone()))?;
    registry.register(Box::new(ROOMS_ASSIGNED_TOTAL.clone()))?;
    registry.register(Box::new(ROOMS_REQUEUED_TOTAL.clone()))?;
    registry.register(Box::new(ENGINES_EVICTED_TOTAL.clone()))?;
    registry.register(Box::new(ASSIGNMENT_PUBLISH_FAILURES_TOTAL.clone()))?;

    Ok(())
}

/// Prometheus text exposition of `registry`.
pub fn render(registry: &Registry) -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_into_a_fresh_registry() {
        let registry = Registry::new();
        register_custom_metrics(&registry).unwrap();
        ACTIONS_REJECTED_TOTAL.with_label_values(&["too_soon"]).inc();

        let text = render(&registry).unwrap();
        assert!(text.contains("actions_rejected_total"));
        assert!(text.contains("pending_rooms"));
    }
}
