use std::{sync::Arc, time::Duration};

use actix::{fut, Actor, ActorContext, ActorFutureExt, AsyncContext, Context};
use message_bus::{topics, Outbox};
use room_core::{
    protocol::ActionRequest, Action, DiffRecord, RoomError, RoomId, RoomState,
};
use tracing::{debug, error, info, warn};

use crate::repository::RoomRepository;

pub mod handlers;
pub mod messages;

pub use messages::*;

/// Owns one room's state. Every mutation goes through this actor's mailbox,
/// so the state machine itself needs no locking.
pub struct RoomProcessor {
    state: RoomState,
    outbox: Outbox,
    repository: Arc<dyn RoomRepository>,
    flush_interval: Duration,
    flushing: bool,
    stopping: bool,
}

impl RoomProcessor {
    pub fn new(
        state: RoomState,
        outbox: Outbox,
        repository: Arc<dyn RoomRepository>,
        flush_interval: Duration,
    ) -> Self {
        Self {
            state,
            outbox,
            repository,
            flush_interval,
            flushing: false,
            stopping: false,
        }
    }

    pub fn room_id(&self) -> RoomId {
        self.state.room_id()
    }

    fn process(&mut self, payload: &str) {
        let room_id = self.room_id();
        let timer = metrics::ACTION_APPLY_DURATION_SECONDS.start_timer();

        let action = match serde_json::from_str::<ActionRequest>(payload)
            .map_err(|e| RoomError::InvalidAction(e.to_string()))
            .and_then(|request| Action::parse(&request))
        {
            Ok(action) => action,
            Err(e) => {
                metrics::ABNORMAL_UNKNOWN_TYPE_TOTAL.inc();
                debug!("[{}] Dropping malformed action: {}", room_id, e);
                return;
            }
        };

        let version = match self.state.apply(action) {
            Ok(version) => version,
            Err(e) => {
                metrics::ACTIONS_REJECTED_TOTAL
                    .with_label_values(&[e.reason()])
                    .inc();
                debug!("[{}] Rejected {:?}: {}", room_id, action, e);
                return;
            }
        };
        metrics::ACTIONS_APPLIED_TOTAL
            .with_label_values(&[action.kind().as_str()])
            .inc();

        let result = action.format(&self.state, version);
        match serde_json::to_string(&result) {
            Ok(frame) => self.outbox.send(topics::room_result(room_id), frame),
            Err(e) => error!("[{}] Failed to serialize result: {}", room_id, e),
        }
        timer.observe_duration();
    }

    /// Drains the diff and writes it out. At most one flush runs at a time;
    /// records that fail to write are merged back under newer changes.
    fn flush(&mut self, ctx: &mut Context<Self>) {
        if self.flushing {
            return;
        }
        let records = self.state.diff();
        if records.is_empty() {
            if self.stopping {
                ctx.stop();
            }
            return;
        }

        self.flushing = true;
        let room_id = self.room_id();
        let repository = self.repository.clone();
        let write = write_records(repository, room_id, records);

        ctx.spawn(fut::wrap_future::<_, Self>(write).map(
            move |failed, act, ctx| {
                act.flushing = false;
                let failed_count = failed.len();
                if failed_count > 0 {
                    metrics::DIFF_FLUSH_FAILURES_TOTAL.inc();
                    act.state.requeue_diff(failed);
                }

                if !act.stopping {
                    return;
                }
                if failed_count == 0 && act.state.has_pending_diff() {
                    act.flush(ctx);
                } else {
                    if failed_count > 0 {
                        error!(
                            "[{}] Stopping with {} unflushed participant records",
                            room_id, failed_count
                        );
                    }
                    ctx.stop();
                }
            },
        ));
    }
}

/// Upserts each record independently and returns the ones that failed.
async fn write_records(
    repository: Arc<dyn RoomRepository>,
    room_id: RoomId,
    records: Vec<DiffRecord>,
) -> Vec<DiffRecord> {
    let mut failed = Vec::new();
    for record in records {
        match repository.upsert_participant(room_id, &record).await {
            Ok(()) => metrics::DIFF_RECORDS_FLUSHED_TOTAL.inc(),
            Err(e) => {
                warn!(
                    "[{}] Failed to persist participant {}: {}",
                    room_id, record.user_id, e
                );
                failed.push(record);
            }
        }
    }
    failed
}

impl Actor for RoomProcessor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!(
            "[{}] Room processor started at version {}",
            self.room_id(),
            self.state.version()
        );
        metrics::ACTIVE_ROOMS.inc();
        ctx.run_interval(self.flush_interval, |act, ctx| {
            if !act.stopping {
                act.flush(ctx);
            }
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        metrics::ACTIVE_ROOMS.dec();
        info!("[{}] Room processor stopped", self.room_id());
    }
}
