use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakerState {
    Closed { failures: u64 },
    Open { until: Instant, failures: u64 },
    /// Cooldown over; the next attempt decides.
    Trial { failures: u64 },
}

/// Stops reconnect storms against the bus after repeated failures.
///
/// `threshold` consecutive failures open the breaker for `cooldown`. After
/// that a single trial attempt is let through: success closes the breaker,
/// failure opens it again straight away.
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u64,
    cooldown: Duration,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(threshold: u64, cooldown_seconds: u64) -> Self {
        Self::with_cooldown(threshold, Duration::from_secs(cooldown_seconds))
    }

    pub fn with_cooldown(threshold: u64, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown,
            state: Mutex::new(BreakerState::Closed { failures: 0 }),
        }
    }

    /// Time left before the next attempt may go through, `None` when closed.
    pub fn remaining_cooldown(&self) -> Option<Duration> {
        let mut state = self.state.lock();
        match *state {
            BreakerState::Open { until, failures } => {
                let now = Instant::now();
                if until > now {
                    Some(until - now)
                } else {
                    *state = BreakerState::Trial { failures };
                    None
                }
            }
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.remaining_cooldown().is_some()
    }

    pub fn record_success(&self) {
        let previous = std::mem::replace(
            &mut *self.state.lock(),
            BreakerState::Closed { failures: 0 },
        );
        match previous {
            BreakerState::Open { failures, .. } | BreakerState::Trial { failures } => {
                info!("Bus circuit breaker closed after {} failures", failures);
            }
            BreakerState::Closed { .. } => {}
        }
    }

    pub fn record_failure(&self) {
        metrics::REDIS_CONNECTION_FAILURES_TOTAL.inc();
        let mut state = self.state.lock();
        let failures = match *state {
            BreakerState::Closed { failures }
            | BreakerState::Open { failures, .. }
            | BreakerState::Trial { failures } => failures + 1,
        };
        let reopen = matches!(*state, BreakerState::Trial { .. });

        if reopen || failures >= self.threshold {
            *state = BreakerState::Open {
                until: Instant::now() + self.cooldown,
                failures,
            };
            metrics::CIRCUIT_BREAKER_OPEN_TOTAL.inc();
            error!(
                "Bus circuit breaker open after {} failures, pausing {:?}",
                failures, self.cooldown
            );
        } else {
            *state = BreakerState::Closed { failures };
            warn!("Bus failure {}/{}", failures, self.threshold);
        }
    }

    pub fn failure_count(&self) -> u64 {
        match *self.state.lock() {
            BreakerState::Closed { failures }
            | BreakerState::Open { failures, .. }
            | BreakerState::Trial { failures } => failures,
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(5, 60)
    }
}
