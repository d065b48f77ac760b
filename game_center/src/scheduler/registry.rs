//! Scheduler bookkeeping with no I/O: engines, the pending queue and who
//! owns which room. Time is always passed in.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    time::{Duration, Instant},
};

use actix::MessageResponse;
use room_core::{protocol::Heartbeat, EngineId, RoomId};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone)]
struct EngineRecord {
    rooms: HashSet<RoomId>,
    last_heartbeat: Instant,
}

#[derive(Debug, Clone)]
struct Assignment {
    engine_id: EngineId,
    assigned_at: Instant,
}

/// What a heartbeat changed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct HeartbeatOutcome {
    pub new_engine: bool,
    /// Rooms taken from this engine and put back in the queue.
    pub requeued: Vec<RoomId>,
    /// Pending rooms the engine turned out to be running already; now its own.
    pub adopted: Vec<RoomId>,
    /// Rooms the engine runs although another engine owns them, or nobody
    /// knows them at all.
    pub strays: Vec<RoomId>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Deletion {
    WasPending,
    WasOwned(EngineId),
    Unknown,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineView {
    pub engine_id: EngineId,
    pub rooms: Vec<RoomId>,
    pub last_heartbeat_ms_ago: u64,
    pub live: bool,
}

#[derive(Debug, Clone, Serialize, MessageResponse)]
pub struct FleetView {
    pub engines: Vec<EngineView>,
    pub pending: Vec<RoomId>,
}

#[derive(Debug, Clone)]
pub struct FleetRegistry {
    engines: HashMap<EngineId, EngineRecord>,
    pending: VecDeque<RoomId>,
    owners: HashMap<RoomId, Assignment>,
    heartbeat_timeout: Duration,
    assignment_grace: Duration,
}

impl FleetRegistry {
    pub fn new(heartbeat_timeout: Duration, assignment_grace: Duration) -> Self {
        Self {
            engines: HashMap::new(),
            pending: VecDeque::new(),
            owners: HashMap::new(),
            heartbeat_timeout,
            assignment_grace,
        }
    }

    /// Rebuilds ownership from persisted `(room, owner)` rows. Known engines
    /// get one full timeout to heartbeat before the janitor evicts them.
    pub fn from_assignments<I>(
        assignments: I,
        now: Instant,
        heartbeat_timeout: Duration,
        assignment_grace: Duration,
    ) -> Self
    where
        I: IntoIterator<Item = (RoomId, Option<EngineId>)>,
    {
        let mut registry = Self::new(heartbeat_timeout, assignment_grace);
        let mut rows: Vec<_> = assignments.into_iter().collect();
        rows.sort_by_key(|(room_id, _)| *room_id);

        for (room_id, owner) in rows {
            match owner {
                Some(engine_id) => registry.assign(room_id, engine_id, now),
                None => registry.pending.push_back(room_id),
            }
        }
        registry
    }

    fn assign(&mut self, room_id: RoomId, engine_id: EngineId, now: Instant) {
        self.engines
            .entry(engine_id.clone())
            .or_insert_with(|| EngineRecord {
                rooms: HashSet::new(),
                last_heartbeat: now,
            })
            .rooms
            .insert(room_id);
        self.owners.insert(
            room_id,
            Assignment {
                engine_id,
                assigned_at: now,
            },
        );
    }

    /// Drops ownership of `room_id` and returns its former owner.
    fn release(&mut self, room_id: RoomId) -> Option<EngineId> {
        let assignment = self.owners.remove(&room_id)?;
        if let Some(engine) = self.engines.get_mut(&assignment.engine_id) {
            engine.rooms.remove(&room_id);
        }
        Some(assignment.engine_id)
    }

    fn is_live(&self, engine: &EngineRecord, now: Instant) -> bool {
        now.saturating_duration_since(engine.last_heartbeat) <= self.heartbeat_timeout
    }

    pub fn heartbeat(&mut self, heartbeat: &Heartbeat, now: Instant) -> HeartbeatOutcome {
        let engine_id = &heartbeat.engine_id;
        let mut outcome = HeartbeatOutcome::default();

        match self.engines.get_mut(engine_id) {
            Some(engine) => {
                engine.last_heartbeat = now;
                if heartbeat.is_first_ping && !engine.rooms.is_empty() {
                    let mut rooms: Vec<RoomId> = engine.rooms.iter().copied().collect();
                    rooms.sort();
                    warn!(
                        "Engine {} restarted, requeueing {} rooms",
                        engine_id,
                        rooms.len()
                    );
                    for room_id in &rooms {
                        self.release(*room_id);
                        self.pending.push_back(*room_id);
                    }
                    outcome.requeued = rooms;
                }
            }
            None => {
                info!("Engine {} registered", engine_id);
                self.engines.insert(
                    engine_id.clone(),
                    EngineRecord {
                        rooms: HashSet::new(),
                        last_heartbeat: now,
                    },
                );
                outcome.new_engine = true;
            }
        }

        if let Some(reported) = &heartbeat.rooms {
            let reported: HashSet<RoomId> = reported.iter().copied().collect();

            let mut missing: Vec<RoomId> = self
                .engines
                .get(engine_id)
                .map(|engine| {
                    engine
                        .rooms
                        .iter()
                        .filter(|room_id| !reported.contains(room_id))
                        .filter(|room_id| {
                            self.owners.get(room_id).map_or(false, |a| {
                                now.saturating_duration_since(a.assigned_at) >= self.assignment_grace
                            })
                        })
                        .copied()
                        .collect()
                })
                .unwrap_or_default();
            missing.sort();
            for room_id in &missing {
                warn!("Engine {} is not running room {}, requeueing", engine_id, room_id);
                self.release(*room_id);
                self.pending.push_back(*room_id);
            }
            outcome.requeued.extend(missing);

            let mut reported: Vec<RoomId> = reported.into_iter().collect();
            reported.sort();
            for room_id in reported {
                match self.owners.get(&room_id) {
                    Some(a) if &a.engine_id == engine_id => {}
                    Some(_) => outcome.strays.push(room_id),
                    None => match self.pending.iter().position(|r| *r == room_id) {
                        Some(index) => {
                            self.pending.remove(index);
                            self.assign(room_id, engine_id.clone(), now);
                            info!("Engine {} already runs pending room {}, adopting", engine_id, room_id);
                            outcome.adopted.push(room_id);
                        }
                        None => outcome.strays.push(room_id),
                    },
                }
            }
        }

        outcome
    }

    /// Queues a new room. Returns false if it is already known.
    pub fn room_created(&mut self, room_id: RoomId) -> bool {
        if self.owners.contains_key(&room_id) || self.pending.contains(&room_id) {
            return false;
        }
        self.pending.push_back(room_id);
        true
    }

    pub fn room_deleted(&mut self, room_id: RoomId) -> Deletion {
        if let Some(index) = self.pending.iter().position(|r| *r == room_id) {
            self.pending.remove(index);
            return Deletion::WasPending;
        }
        match self.release(room_id) {
            Some(engine_id) => Deletion::WasOwned(engine_id),
            None => Deletion::Unknown,
        }
    }

    /// Pops the head of the queue onto the least-loaded live engine. `None`
    /// when nothing is pending or no engine is live.
    pub fn next_assignment(&mut self, now: Instant) -> Option<(RoomId, EngineId)> {
        if self.pending.is_empty() {
            return None;
        }
        let engine_id = self
            .engines
            .iter()
            .filter(|(_, engine)| self.is_live(engine, now))
            .min_by(|(a_id, a), (b_id, b)| {
                a.rooms.len().cmp(&b.rooms.len()).then_with(|| a_id.cmp(b_id))
            })
            .map(|(engine_id, _)| engine_id.clone())?;

        let room_id = self.pending.pop_front()?;
        self.assign(room_id, engine_id.clone(), now);
        Some((room_id, engine_id))
    }

    /// Undoes an assignment that never reached its engine. The room goes back
    /// to the front of the queue. Ignored if the room has moved on since.
    pub fn unassign(&mut self, room_id: RoomId, engine_id: &str) -> bool {
        match self.owners.get(&room_id) {
            Some(a) if a.engine_id == engine_id => {
                self.release(room_id);
                self.pending.push_front(room_id);
                true
            }
            _ => false,
        }
    }

    /// Evicts engines whose last heartbeat is older than the timeout and
    /// requeues their rooms.
    pub fn janitor(&mut self, now: Instant) -> Vec<(EngineId, Vec<RoomId>)> {
        let mut stale: Vec<EngineId> = self
            .engines
            .iter()
            .filter(|(_, engine)| !self.is_live(engine, now))
            .map(|(engine_id, _)| engine_id.clone())
            .collect();
        stale.sort();

        let mut evicted = Vec::with_capacity(stale.len());
        for engine_id in stale {
            let Some(engine) = self.engines.remove(&engine_id) else {
                continue;
            };
            let mut rooms: Vec<RoomId> = engine.rooms.into_iter().collect();
            rooms.sort();
            for room_id in &rooms {
                self.owners.remove(room_id);
                self.pending.push_back(*room_id);
            }
            warn!(
                "Engine {} evicted after missing heartbeats, {} rooms requeued",
                engine_id,
                rooms.len()
            );
            evicted.push((engine_id, rooms));
        }
        evicted
    }

    pub fn pending(&self) -> Vec<RoomId> {
        self.pending.iter().copied().collect()
    }

    pub fn owner_of(&self, room_id: &RoomId) -> Option<&EngineId> {
        self.owners.get(room_id).map(|a| &a.engine_id)
    }

    pub fn engine_rooms(&self, engine_id: &str) -> Vec<RoomId> {
        let mut rooms: Vec<RoomId> = self
            .engines
            .get(engine_id)
            .map(|engine| engine.rooms.iter().copied().collect())
            .unwrap_or_default();
        rooms.sort();
        rooms
    }

    pub fn live_engine_count(&self, now: Instant) -> usize {
        self.engines
            .values()
            .filter(|engine| self.is_live(engine, now))
            .count()
    }

    pub fn view(&self, now: Instant) -> FleetView {
        let mut engines: Vec<EngineView> = self
            .engines
            .iter()
            .map(|(engine_id, engine)| EngineView {
                engine_id: engine_id.clone(),
                rooms: self.engine_rooms(engine_id),
                last_heartbeat_ms_ago: now
                    .saturating_duration_since(engine.last_heartbeat)
                    .as_millis() as u64,
                live: self.is_live(engine, now),
            })
            .collect();
        engines.sort_by(|a, b| a.engine_id.cmp(&b.engine_id));
        FleetView {
            engines,
            pending: self.pending(),
        }
    }
}
