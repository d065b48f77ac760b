use std::collections::HashMap;

use actix::{Actor, Context};
use futures::channel::mpsc;
use message_bus::{topics, Outbox};
use room_core::{
    protocol::{ActionResult, InitValue},
    Action, ActionType, RoomId, Snapshot, UserId,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::protocol::ServerFrame;

pub mod handlers;
pub mod messages;

pub use messages::*;

/// Serialized frames for one client, in delivery order.
pub type ClientReceiver = mpsc::Receiver<String>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HubError {
    #[error("client {0} is already registered in this room")]
    AlreadyRegistered(UserId),
}

enum Sent {
    Ok,
    Dropped,
    Disconnected,
}

struct ClientSlot {
    tx: mpsc::Sender<String>,
    /// Broadcasts held back until the client's snapshot arrives.
    awaiting_snapshot: Option<Vec<ActionResult>>,
    /// Set once the room reported this client's exit.
    left: bool,
}

impl ClientSlot {
    fn send(&mut self, client_id: UserId, frame: String) -> Sent {
        match self.tx.try_send(frame) {
            Ok(()) => Sent::Ok,
            Err(e) if e.is_full() => {
                metrics::CLIENT_FRAMES_DROPPED_TOTAL.inc();
                warn!("Client {} buffer full, dropping frame", client_id);
                Sent::Dropped
            }
            Err(_) => Sent::Disconnected,
        }
    }

    fn send_result(&mut self, client_id: UserId, result: &ActionResult) -> Sent {
        match serde_json::to_string(result) {
            Ok(frame) => self.send(client_id, frame),
            Err(e) => {
                warn!("Failed to serialize result {}: {}", result.id, e);
                Sent::Dropped
            }
        }
    }

    fn send_frame(&mut self, client_id: UserId, frame: &ServerFrame) -> Sent {
        match frame.to_text() {
            Some(text) => self.send(client_id, text),
            None => Sent::Dropped,
        }
    }

    /// Map, then snapshot, then whatever was buffered and is newer than the
    /// snapshot.
    fn send_init(&mut self, client_id: UserId, result: &ActionResult) -> Sent {
        let init = match serde_json::from_value::<InitValue>(result.value.clone()) {
            Ok(init) => init,
            Err(e) => {
                warn!("Malformed init result for {}: {}", client_id, e);
                return Sent::Dropped;
            }
        };
        let buffered = self.awaiting_snapshot.take().unwrap_or_default();

        let map = ServerFrame::Map { value: init.map };
        let snapshot = ServerFrame::Snapshot {
            id: init.version,
            value: Snapshot {
                version: init.version,
                participants: init.participants,
            },
        };
        for frame in [&map, &snapshot] {
            if let Sent::Disconnected = self.send_frame(client_id, frame) {
                return Sent::Disconnected;
            }
        }
        for result in buffered.iter().filter(|r| r.id > init.version) {
            if let Sent::Disconnected = self.send_result(client_id, result) {
                return Sent::Disconnected;
            }
        }
        Sent::Ok
    }
}

/// Fans room results out to the clients connected to this process.
pub struct ClientHub {
    rooms: HashMap<RoomId, HashMap<UserId, ClientSlot>>,
    buffer: usize,
    /// Where re-requested inits are published.
    outbox: Outbox,
}

impl ClientHub {
    pub fn new(buffer: usize, outbox: Outbox) -> Self {
        Self {
            rooms: HashMap::new(),
            buffer: buffer.max(1),
            outbox,
        }
    }

    fn request(&self, room_id: RoomId, action: Action) {
        match serde_json::to_string(&action.to_request()) {
            Ok(payload) => self.outbox.send(topics::room_action(room_id), payload),
            Err(e) => warn!("[{}] Failed to serialize action: {}", room_id, e),
        }
    }

    /// A processor took the room over: every local client goes back to
    /// waiting and asks the new owner for a fresh map and snapshot. Clients
    /// whose join never landed join again; those that left stay out.
    fn resync(&mut self, room_id: RoomId) {
        let Some(clients) = self.rooms.get_mut(&room_id) else {
            return;
        };
        let mut requests = Vec::with_capacity(clients.len() * 2);
        for (client_id, slot) in clients.iter_mut() {
            slot.awaiting_snapshot = Some(Vec::new());
            requests.push(Action::InitSnapshot { user_id: *client_id });
            if !slot.left {
                requests.push(Action::Join { user_id: *client_id });
            }
        }
        info!("[{}] Resynchronizing {} clients", room_id, clients.len());
        for action in requests {
            self.request(room_id, action);
        }
    }

    fn deliver(&mut self, room_id: RoomId, result: ActionResult) {
        let buffer = self.buffer;
        let Some(clients) = self.rooms.get_mut(&room_id) else {
            return;
        };

        let mut gone = Vec::new();
        if result.only_owner {
            if let Some(slot) = clients.get_mut(&result.user_id) {
                let sent = if result.kind == ActionType::Init {
                    slot.send_init(result.user_id, &result)
                } else if slot.awaiting_snapshot.is_some() {
                    Sent::Ok
                } else {
                    slot.send_result(result.user_id, &result)
                };
                if let Sent::Disconnected = sent {
                    gone.push(result.user_id);
                }
            }
        } else {
            for (client_id, slot) in clients.iter_mut() {
                if *client_id == result.user_id {
                    match result.kind {
                        ActionType::Exit => slot.left = true,
                        ActionType::Join => slot.left = false,
                        _ => {}
                    }
                }
                if let Some(pending) = slot.awaiting_snapshot.as_mut() {
                    if pending.len() < buffer {
                        pending.push(result.clone());
                    } else {
                        metrics::CLIENT_FRAMES_DROPPED_TOTAL.inc();
                        warn!("Client {} snapshot backlog full, dropping frame", client_id);
                    }
                    continue;
                }
                if let Sent::Disconnected = slot.send_result(*client_id, &result) {
                    gone.push(*client_id);
                }
            }
        }

        for client_id in gone {
            info!("[{}] Client {} went away, unregistering", room_id, client_id);
            clients.remove(&client_id);
        }
        if clients.is_empty() {
            self.rooms.remove(&room_id);
        }
    }
}

impl Actor for ClientHub {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        info!("ClientHub started");
    }
}
