use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use actix::{fut, Actor, ActorFutureExt, Addr, AsyncContext, Context};
use message_bus::{publish_json, topics, Outbox, Publisher};
use room_core::{
    protocol::{Heartbeat, RoomOpened},
    EngineId, Participant, RoomId, RoomState,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    processor::RoomProcessor,
    repository::{RepositoryError, RoomRepository},
};

pub mod handlers;
pub mod messages;

pub use messages::*;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to load room {room_id}: {source}")]
    Load {
        room_id: RoomId,
        #[source]
        source: RepositoryError,
    },
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub engine_id: EngineId,
    pub heartbeat_interval: Duration,
    pub flush_interval: Duration,
    pub history_limit: usize,
}

/// Everything the node needs from the outside.
#[derive(Clone)]
pub struct NodeDeps {
    pub publisher: Arc<dyn Publisher>,
    pub repository: Arc<dyn RoomRepository>,
}

/// One engine process: hosts a processor per assigned room and tells the
/// scheduler it is alive.
pub struct EngineNode {
    config: NodeConfig,
    deps: NodeDeps,
    outbox: Outbox,
    rooms: HashMap<RoomId, Addr<RoomProcessor>>,
    /// Rooms whose records are still loading.
    starting: HashSet<RoomId>,
    first_ping_sent: bool,
}

impl EngineNode {
    pub fn new(config: NodeConfig, deps: NodeDeps) -> Self {
        let outbox = Outbox::spawn(deps.publisher.clone());
        Self {
            config,
            deps,
            outbox,
            rooms: HashMap::new(),
            starting: HashSet::new(),
            first_ping_sent: false,
        }
    }

    fn hosted_rooms(&self) -> Vec<RoomId> {
        let mut rooms: Vec<RoomId> = self
            .rooms
            .keys()
            .chain(self.starting.iter())
            .copied()
            .collect();
        rooms.sort();
        rooms.dedup();
        rooms
    }

    fn start_room(&mut self, room_id: RoomId, ctx: &mut Context<Self>) {
        if self.rooms.contains_key(&room_id) || !self.starting.insert(room_id) {
            debug!("[{}] Already hosted, ignoring start", room_id);
            return;
        }
        info!("[{}] Starting room", room_id);

        let repository = self.deps.repository.clone();
        let history_limit = self.config.history_limit;
        let load = async move { load_state(repository.as_ref(), room_id, history_limit).await };

        ctx.spawn(fut::wrap_future::<_, Self>(load).map(move |loaded, act, _ctx| {
            if !act.starting.remove(&room_id) {
                info!("[{}] Stopped while loading, discarding", room_id);
                return;
            }
            match loaded {
                Ok(state) => {
                    let opened = RoomOpened {
                        engine_id: act.config.engine_id.clone(),
                        version: state.version(),
                    };
                    let processor = RoomProcessor::new(
                        state,
                        act.outbox.clone(),
                        act.deps.repository.clone(),
                        act.config.flush_interval,
                    )
                    .start();
                    act.rooms.insert(room_id, processor);
                    act.announce_opened(room_id, &opened);
                }
                // the scheduler requeues it once our heartbeat stops listing it
                Err(e) => error!("{}", e),
            }
        }));
    }

    /// Tells every hub that snapshots taken before this point are void.
    /// Goes through the shared outbox, so it precedes the room's first result.
    fn announce_opened(&self, room_id: RoomId, opened: &RoomOpened) {
        match serde_json::to_string(opened) {
            Ok(payload) => self.outbox.send(topics::room_opened(room_id), payload),
            Err(e) => error!("[{}] Failed to serialize room opened: {}", room_id, e),
        }
    }

    fn stop_room(&mut self, room_id: RoomId) {
        if self.starting.remove(&room_id) {
            info!("[{}] Stop while loading", room_id);
            return;
        }
        match self.rooms.remove(&room_id) {
            Some(processor) => {
                info!("[{}] Stopping room", room_id);
                processor.do_send(crate::processor::StopRoom);
            }
            None => debug!("[{}] Not hosted, ignoring stop", room_id),
        }
    }

    /// Publishes one heartbeat, then schedules the next once it lands.
    fn heartbeat(&mut self, ctx: &mut Context<Self>) {
        let heartbeat = Heartbeat {
            engine_id: self.config.engine_id.clone(),
            is_first_ping: !self.first_ping_sent,
            rooms: Some(self.hosted_rooms()),
        };
        let publisher = self.deps.publisher.clone();
        let publish = async move {
            publish_json(publisher.as_ref(), topics::ENGINE_HEARTBEAT, &heartbeat).await
        };

        ctx.spawn(fut::wrap_future::<_, Self>(publish).map(|res, act, ctx| {
            match res {
                Ok(()) => act.first_ping_sent = true,
                Err(e) => warn!("[{}] Heartbeat failed: {}", act.config.engine_id, e),
            }
            ctx.run_later(act.config.heartbeat_interval, |act, ctx| act.heartbeat(ctx));
        }));
    }
}

async fn load_state(
    repository: &dyn RoomRepository,
    room_id: RoomId,
    history_limit: usize,
) -> Result<RoomState, EngineError> {
    let wrap = |source| EngineError::Load { room_id, source };
    let room = repository.load_room(room_id).await.map_err(wrap)?;
    let map = repository.load_map(room.map_id).await.map_err(wrap)?;
    let participants = repository.load_participants(room_id).await.map_err(wrap)?;

    Ok(RoomState::restore(
        room_id,
        map.to_room_map(),
        participants.into_iter().map(Participant::from),
    )
    .with_history_limit(history_limit))
}

impl Actor for EngineNode {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!("EngineNode {} started", self.config.engine_id);
        self.heartbeat(ctx);
    }
}
