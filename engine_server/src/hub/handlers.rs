use actix::{Context, Handler};
use futures::channel::mpsc;
use tracing::{debug, info};

use super::{messages::*, ClientHub, ClientReceiver, ClientSlot, HubError};

impl Handler<Register> for ClientHub {
    type Result = Result<ClientReceiver, HubError>;

    fn handle(&mut self, msg: Register, _ctx: &mut Context<Self>) -> Self::Result {
        let clients = self.rooms.entry(msg.room_id).or_default();
        if let Some(existing) = clients.get(&msg.client_id) {
            if !existing.tx.is_closed() {
                return Err(HubError::AlreadyRegistered(msg.client_id));
            }
            debug!("Replacing stale registration for {}", msg.client_id);
        }

        let (tx, rx) = mpsc::channel(self.buffer);
        clients.insert(
            msg.client_id,
            ClientSlot {
                tx,
                awaiting_snapshot: Some(Vec::new()),
                left: false,
            },
        );
        info!("[{}] Client {} registered", msg.room_id, msg.client_id);
        Ok(rx)
    }
}

impl Handler<Unregister> for ClientHub {
    type Result = ();

    fn handle(&mut self, msg: Unregister, _ctx: &mut Context<Self>) -> Self::Result {
        if let Some(clients) = self.rooms.get_mut(&msg.room_id) {
            if clients.remove(&msg.client_id).is_some() {
                info!("[{}] Client {} unregistered", msg.room_id, msg.client_id);
            }
            if clients.is_empty() {
                self.rooms.remove(&msg.room_id);
            }
        }
    }
}

impl Handler<Deliver> for ClientHub {
    type Result = ();

    fn handle(&mut self, msg: Deliver, _ctx: &mut Context<Self>) -> Self::Result {
        self.deliver(msg.room_id, msg.result);
    }
}

impl Handler<Resync> for ClientHub {
    type Result = ();

    fn handle(&mut self, msg: Resync, _ctx: &mut Context<Self>) -> Self::Result {
        self.resync(msg.room_id);
    }
}

impl Handler<GetClientCount> for ClientHub {
    type Result = usize;

    fn handle(&mut self, msg: GetClientCount, _ctx: &mut Context<Self>) -> Self::Result {
        self.rooms.get(&msg.room_id).map_or(0, |clients| clients.len())
    }
}
