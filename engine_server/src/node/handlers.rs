use actix::{Context, Handler};
use room_core::{protocol::AssignCommand, RoomId};
use tracing::{debug, info};

use super::{messages::*, EngineNode};
use crate::processor::{ProcessAction, StopRoom};

impl Handler<Assign> for EngineNode {
    type Result = ();

    fn handle(&mut self, msg: Assign, ctx: &mut Context<Self>) -> Self::Result {
        match msg.0 {
            AssignCommand::Start { room_id } => self.start_room(room_id, ctx),
            AssignCommand::Stop { room_id } => self.stop_room(room_id),
        }
    }
}

impl Handler<RouteAction> for EngineNode {
    type Result = ();

    fn handle(&mut self, msg: RouteAction, _ctx: &mut Context<Self>) -> Self::Result {
        match self.rooms.get(&msg.room_id) {
            Some(processor) => processor.do_send(ProcessAction {
                payload: msg.payload,
            }),
            None => debug!("[{}] Not hosted here, dropping action", msg.room_id),
        }
    }
}

impl Handler<GetHostedRooms> for EngineNode {
    type Result = Vec<RoomId>;

    fn handle(&mut self, _msg: GetHostedRooms, _ctx: &mut Context<Self>) -> Self::Result {
        let mut rooms: Vec<RoomId> = self.rooms.keys().copied().collect();
        rooms.sort();
        rooms
    }
}

impl Handler<StopAll> for EngineNode {
    type Result = ();

    fn handle(&mut self, _msg: StopAll, _ctx: &mut Context<Self>) -> Self::Result {
        info!("Stopping {} rooms", self.rooms.len());
        self.starting.clear();
        for (_, processor) in self.rooms.drain() {
            processor.do_send(StopRoom);
        }
    }
}
