use std::time::Instant;

use actix::{Context, Handler};
use metrics::ROOMS_REQUEUED_TOTAL;
use serde_json::json;
use tracing::{debug, info, warn};

use super::{messages::*, Deletion, FleetView, GameCenter};

impl Handler<HandleHeartbeat> for GameCenter {
    type Result = ();

    fn handle(&mut self, msg: HandleHeartbeat, ctx: &mut Context<Self>) -> Self::Result {
        if !self.initialized {
            debug!("Heartbeat from {} before init, ignoring", msg.0.engine_id);
            return;
        }
        let engine_id = msg.0.engine_id.clone();
        let outcome = self.registry.heartbeat(&msg.0, Instant::now());
        self.handle_heartbeat_outcome(ctx, &engine_id, outcome);
    }
}

impl Handler<HandleRoomCreated> for GameCenter {
    type Result = ();

    fn handle(&mut self, msg: HandleRoomCreated, _ctx: &mut Context<Self>) -> Self::Result {
        if self.registry.room_created(msg.room_id) {
            info!("Room {} queued for assignment", msg.room_id);
            self.update_gauges();
        } else {
            debug!("Room {} already known", msg.room_id);
        }
    }
}

impl Handler<HandleRoomDeleted> for GameCenter {
    type Result = ();

    fn handle(&mut self, msg: HandleRoomDeleted, ctx: &mut Context<Self>) -> Self::Result {
        match self.registry.room_deleted(msg.room_id) {
            Deletion::WasPending => info!("Room {} deleted while pending", msg.room_id),
            Deletion::WasOwned(engine_id) => {
                info!("Room {} deleted, stopping it on {}", msg.room_id, engine_id);
                self.send_stop(ctx, msg.room_id, engine_id);
            }
            Deletion::Unknown => debug!("Room {} deleted but was never tracked", msg.room_id),
        }
        self.update_gauges();
    }
}

impl Handler<LoadBalance> for GameCenter {
    type Result = ();

    fn handle(&mut self, _msg: LoadBalance, ctx: &mut Context<Self>) -> Self::Result {
        self.load_balance(ctx);
    }
}

impl Handler<Janitor> for GameCenter {
    type Result = ();

    fn handle(&mut self, _msg: Janitor, ctx: &mut Context<Self>) -> Self::Result {
        self.janitor(ctx);
    }
}

impl Handler<AssignmentFailed> for GameCenter {
    type Result = ();

    fn handle(&mut self, msg: AssignmentFailed, ctx: &mut Context<Self>) -> Self::Result {
        if self.registry.unassign(msg.room_id, &msg.engine_id) {
            warn!("Room {} requeued after failed assignment", msg.room_id);
            ROOMS_REQUEUED_TOTAL.inc();
            self.mirror_owner(ctx, msg.room_id, None);
            self.update_gauges();
        }
    }
}

impl Handler<GetFleet> for GameCenter {
    type Result = FleetView;

    fn handle(&mut self, _msg: GetFleet, _ctx: &mut Context<Self>) -> Self::Result {
        self.registry.view(Instant::now())
    }
}

impl Handler<IsInitialized> for GameCenter {
    type Result = bool;

    fn handle(&mut self, _msg: IsInitialized, _ctx: &mut Context<Self>) -> Self::Result {
        self.initialized
    }
}

impl Handler<GetDebugInfo> for GameCenter {
    type Result = String;

    fn handle(&mut self, _msg: GetDebugInfo, _ctx: &mut Context<Self>) -> Self::Result {
        let view = self.registry.view(Instant::now());
        json!({
            "initialized": self.initialized,
            "engine_count": view.engines.len(),
            "pending_count": view.pending.len(),
            "engines": view.engines,
            "pending": view.pending,
        })
        .to_string()
    }
}
