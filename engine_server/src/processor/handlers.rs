use actix::{Context, Handler};
use room_core::{RoomError, Snapshot};
use tracing::{debug, info};

use super::{messages::*, RoomProcessor};

impl Handler<ProcessAction> for RoomProcessor {
    type Result = ();

    fn handle(&mut self, msg: ProcessAction, _ctx: &mut Context<Self>) -> Self::Result {
        if self.stopping {
            debug!("[{}] Stopping, dropping action", self.room_id());
            return;
        }
        self.process(&msg.payload);
    }
}

impl Handler<FlushDiff> for RoomProcessor {
    type Result = ();

    fn handle(&mut self, _msg: FlushDiff, ctx: &mut Context<Self>) -> Self::Result {
        self.flush(ctx);
    }
}

impl Handler<StopRoom> for RoomProcessor {
    type Result = ();

    fn handle(&mut self, _msg: StopRoom, ctx: &mut Context<Self>) -> Self::Result {
        if self.stopping {
            return;
        }
        info!("[{}] Stop requested, flushing", self.room_id());
        self.stopping = true;
        // a flush already in flight picks up the stop when it lands
        if !self.flushing {
            self.flush(ctx);
        }
    }
}

impl Handler<GetSnapshot> for RoomProcessor {
    type Result = Result<Snapshot, RoomError>;

    fn handle(&mut self, msg: GetSnapshot, _ctx: &mut Context<Self>) -> Self::Result {
        match msg.at {
            Some(version) if version != self.state.version() => {
                Ok(self.state.revert_to(version)?.serialize())
            }
            _ => Ok(self.state.serialize()),
        }
    }
}
