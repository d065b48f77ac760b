use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use actix::{fut, Actor, ActorFutureExt, AsyncContext, Context};
use message_bus::{publish_json, topics, BusError, Publisher};
use metrics::{
    ASSIGNMENT_PUBLISH_FAILURES_TOTAL, ENGINES_EVICTED_TOTAL, LIVE_ENGINES, PENDING_ROOMS,
    ROOMS_ASSIGNED_TOTAL, ROOMS_REQUEUED_TOTAL,
};
use room_core::{protocol::AssignCommand, EngineId, RoomId};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::store::OwnershipStore;

pub mod handlers;
pub mod messages;
pub mod registry;

pub use messages::*;
pub use registry::{Deletion, FleetRegistry, FleetView, HeartbeatOutcome};

/// Wait before retrying a failed ownership load.
const INIT_RETRY: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("ownership store unavailable")]
    StoreUnavailable,
    #[error("unknown room {0}")]
    UnknownRoom(RoomId),
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub load_balance_interval: Duration,
    pub janitor_interval: Duration,
    pub heartbeat_timeout: Duration,
    pub assignment_grace: Duration,
}

/// The fleet scheduler. The actor mailbox serializes every registry change.
pub struct GameCenter {
    config: SchedulerConfig,
    registry: FleetRegistry,
    publisher: Arc<dyn Publisher>,
    store: Arc<dyn OwnershipStore>,
    initialized: bool,
}

impl GameCenter {
    pub fn new(
        config: SchedulerConfig,
        publisher: Arc<dyn Publisher>,
        store: Arc<dyn OwnershipStore>,
    ) -> Self {
        let registry = FleetRegistry::new(config.heartbeat_timeout, config.assignment_grace);
        Self {
            config,
            registry,
            publisher,
            store,
            initialized: false,
        }
    }

    /// Rebuilds the registry from the store. Nothing else is handled until
    /// the load finishes.
    fn init(&mut self, ctx: &mut Context<Self>) {
        let store = self.store.clone();
        let load = async move { store.load_assignments().await };

        ctx.wait(fut::wrap_future::<_, Self>(load).map(|res, act, ctx| match res {
            Ok(assignments) => {
                let carried = act.registry.pending();
                act.registry = FleetRegistry::from_assignments(
                    assignments,
                    Instant::now(),
                    act.config.heartbeat_timeout,
                    act.config.assignment_grace,
                );
                for room_id in carried {
                    act.registry.room_created(room_id);
                }
                act.initialized = true;
                info!(
                    "GameCenter initialized: {} pending rooms",
                    act.registry.pending().len()
                );
                act.update_gauges();
                act.schedule_load_balance(ctx);
                act.schedule_janitor(ctx);
            }
            Err(e) => {
                error!("Failed to load room ownership: {}. Retrying in {:?}", e, INIT_RETRY);
                ctx.run_later(INIT_RETRY, |act, ctx| act.init(ctx));
            }
        }));
    }

    fn schedule_load_balance(&self, ctx: &mut Context<Self>) {
        ctx.run_later(self.config.load_balance_interval, |act, ctx| {
            act.load_balance(ctx);
            act.schedule_load_balance(ctx);
        });
    }

    fn schedule_janitor(&self, ctx: &mut Context<Self>) {
        ctx.run_later(self.config.janitor_interval, |act, ctx| {
            act.janitor(ctx);
            act.schedule_janitor(ctx);
        });
    }

    /// Hands every pending room to the least-loaded live engine.
    pub(crate) fn load_balance(&mut self, ctx: &mut Context<Self>) {
        if !self.initialized {
            return;
        }
        let now = Instant::now();
        while let Some((room_id, engine_id)) = self.registry.next_assignment(now) {
            info!("Assigning room {} to engine {}", room_id, engine_id);
            ROOMS_ASSIGNED_TOTAL.inc();
            self.send_start(ctx, room_id, engine_id.clone());
            self.mirror_owner(ctx, room_id, Some(engine_id));
        }
        self.update_gauges();
    }

    /// Evicts silent engines and requeues their rooms.
    pub(crate) fn janitor(&mut self, ctx: &mut Context<Self>) {
        if !self.initialized {
            return;
        }
        for (engine_id, rooms) in self.registry.janitor(Instant::now()) {
            ENGINES_EVICTED_TOTAL.inc();
            debug!("Engine {} evicted with rooms {:?}", engine_id, rooms);
            for room_id in rooms {
                ROOMS_REQUEUED_TOTAL.inc();
                self.mirror_owner(ctx, room_id, None);
            }
        }
        self.update_gauges();
    }

    pub(crate) fn handle_heartbeat_outcome(
        &mut self,
        ctx: &mut Context<Self>,
        engine_id: &EngineId,
        outcome: HeartbeatOutcome,
    ) {
        for room_id in outcome.requeued {
            ROOMS_REQUEUED_TOTAL.inc();
            self.mirror_owner(ctx, room_id, None);
        }
        for room_id in outcome.adopted {
            self.mirror_owner(ctx, room_id, Some(engine_id.clone()));
        }
        for room_id in outcome.strays {
            warn!("Engine {} runs room {} it does not own, stopping it", engine_id, room_id);
            self.send_stop(ctx, room_id, engine_id.clone());
        }
        self.update_gauges();
    }

    /// Publishes `start`; a failed publish comes back as `AssignmentFailed`.
    fn send_start(&self, ctx: &mut Context<Self>, room_id: RoomId, engine_id: EngineId) {
        let publisher = self.publisher.clone();
        let topic = topics::engine_assign(&engine_id);
        let publish = async move {
            publish_json(publisher.as_ref(), &topic, &AssignCommand::Start { room_id }).await
        };

        ctx.spawn(fut::wrap_future::<_, Self>(publish).map(move |res, _act, ctx| {
            if let Err(e) = res {
                error!("Failed to send start of room {} to {}: {}", room_id, engine_id, e);
                ASSIGNMENT_PUBLISH_FAILURES_TOTAL.inc();
                ctx.notify(AssignmentFailed { room_id, engine_id });
            }
        }));
    }

    pub(crate) fn send_stop(&self, ctx: &mut Context<Self>, room_id: RoomId, engine_id: EngineId) {
        let publisher = self.publisher.clone();
        let topic = topics::engine_assign(&engine_id);
        let publish = async move {
            publish_json(publisher.as_ref(), &topic, &AssignCommand::Stop { room_id }).await
        };

        ctx.spawn(fut::wrap_future::<_, Self>(publish).map(move |res, _act, _ctx| {
            // an owner that missed this stop gets another one from its next heartbeat
            if let Err(e) = res {
                warn!("Failed to send stop of room {} to {}: {}", room_id, engine_id, e);
                ASSIGNMENT_PUBLISH_FAILURES_TOTAL.inc();
            }
        }));
    }

    /// Best-effort write of the new owner; the registry stays authoritative.
    pub(crate) fn mirror_owner(
        &self,
        ctx: &mut Context<Self>,
        room_id: RoomId,
        engine_id: Option<EngineId>,
    ) {
        let store = self.store.clone();
        let write = async move { store.set_owner(room_id, engine_id).await };

        ctx.spawn(fut::wrap_future::<_, Self>(write).map(move |res, _act, _ctx| {
            if let Err(e) = res {
                warn!("Failed to persist owner of room {}: {}", room_id, e);
            }
        }));
    }

    fn update_gauges(&self) {
        PENDING_ROOMS.set(self.registry.pending().len() as i64);
        LIVE_ENGINES.set(self.registry.live_engine_count(Instant::now()) as i64);
    }
}

impl Actor for GameCenter {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!("GameCenter actor started");
        self.init(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        info!("GameCenter actor stopped");
    }
}
