use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    geometry::{Cell, DEFAULT_HISTORY_LIMIT, MOVE_DELAY},
    Action, DiffRecord, Direction, Participant, ParticipantView, Position, RoomError, RoomId,
    RoomMap, UserId,
};

/// Deterministic view of a room handed to newly subscribed clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u64,
    pub participants: Vec<ParticipantView>,
}

/// How to take back one applied action.
#[derive(Debug, Clone)]
enum Undo {
    Move {
        user_id: UserId,
        direction: Direction,
        last_moved_at: Option<Instant>,
    },
    Remove {
        user_id: UserId,
    },
    Deactivate {
        user_id: UserId,
        previous_position: Position,
    },
    Reactivate {
        user_id: UserId,
    },
}

#[derive(Debug, Clone)]
struct HistoryEntry {
    version: u64,
    undo: Undo,
}

/// One room's authoritative world.
///
/// Not synchronized: exactly one owner drives a `RoomState`, one action at a
/// time. `version` grows by one per state-changing action; snapshots and
/// rotations leave it alone.
#[derive(Debug, Clone)]
pub struct RoomState {
    room_id: RoomId,
    version: u64,
    map: RoomMap,
    participants: HashMap<UserId, Participant>,
    /// Cell of every active participant.
    occupancy: HashMap<Cell, UserId>,
    /// Newest first.
    history: VecDeque<HistoryEntry>,
    history_limit: usize,
    pending: HashMap<UserId, DiffRecord>,
}

impl RoomState {
    pub fn new(room_id: RoomId, map: RoomMap) -> Self {
        Self {
            room_id,
            version: 0,
            map,
            participants: HashMap::new(),
            occupancy: HashMap::new(),
            history: VecDeque::new(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            pending: HashMap::new(),
        }
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self.history.truncate(limit);
        self
    }

    /// Rebuilds a room from persisted participant records.
    pub fn restore<I>(room_id: RoomId, map: RoomMap, participants: I) -> Self
    where
        I: IntoIterator<Item = Participant>,
    {
        let mut state = Self::new(room_id, map);
        for mut participant in participants {
            let user_id = participant.user_id;
            let mut relocated = false;
            if participant.active && !state.is_free(participant.position) {
                match state.relocate(participant.position) {
                    Ok(position) => {
                        warn!(
                            "[{}] participant {} restored onto illegal cell {:?}, moved to {:?}",
                            room_id,
                            user_id,
                            participant.position.cell(),
                            position.cell()
                        );
                        participant.position = position;
                        relocated = true;
                    }
                    Err(_) => {
                        warn!(
                            "[{}] participant {} restored onto illegal cell {:?} with no free cell left, marking inactive",
                            room_id,
                            user_id,
                            participant.position.cell()
                        );
                        participant.active = false;
                        relocated = true;
                    }
                }
            }
            if participant.active {
                state.occupancy.insert(participant.position.cell(), user_id);
            }
            state.participants.insert(user_id, participant);
            if relocated {
                state.mark_dirty(user_id);
            }
        }
        state
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn map(&self) -> &RoomMap {
        &self.map
    }

    pub fn participant(&self, user_id: &UserId) -> Option<&Participant> {
        self.participants.get(user_id)
    }

    pub fn active_count(&self) -> usize {
        self.occupancy.len()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn has_pending_diff(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn apply(&mut self, action: Action) -> Result<u64, RoomError> {
        self.apply_at(action, Instant::now())
    }

    /// Validates and applies `action` as of `now`, returning the version after
    /// the apply. Nothing is mutated when an error is returned.
    pub fn apply_at(&mut self, action: Action, now: Instant) -> Result<u64, RoomError> {
        match action {
            Action::Move { user_id, direction } => self.apply_move(user_id, direction, now),
            Action::Join { user_id } => self.apply_join(user_id),
            Action::Exit { user_id } => self.apply_exit(user_id),
            Action::InitSnapshot { .. } => Ok(self.version),
        }
    }

    fn apply_move(
        &mut self,
        user_id: UserId,
        direction: Direction,
        now: Instant,
    ) -> Result<u64, RoomError> {
        let participant = self
            .participants
            .get(&user_id)
            .ok_or(RoomError::NotFound(user_id))?;
        if !participant.active {
            return Err(RoomError::NotActive(user_id));
        }

        if participant.direction != direction {
            // rotation: facing only, no rate limit, no version bump
            if let Some(p) = self.participants.get_mut(&user_id) {
                p.direction = direction;
            }
            self.mark_dirty(user_id);
            return Ok(self.version);
        }

        if let Some(last) = participant.last_moved_at {
            if now.saturating_duration_since(last) < MOVE_DELAY {
                return Err(RoomError::TooSoon(user_id));
            }
        }

        let current = participant.position;
        if !self.map.is_clear(current) {
            let (cx, cy) = current.cell();
            return Err(RoomError::Blocked(cx, cy));
        }

        let target = current.step(direction);
        if target == current {
            return Err(RoomError::Unchanged);
        }
        self.check_legal(target)?;
        let target_cell = target.cell();
        if let Some(other) = self.occupancy.get(&target_cell) {
            if *other != user_id {
                return Err(RoomError::Occupied(target_cell.0, target_cell.1));
            }
        }

        let previous_move = participant.last_moved_at;
        self.occupy(user_id, current, target);
        if let Some(p) = self.participants.get_mut(&user_id) {
            p.position = target;
            p.last_moved_at = Some(now);
        }
        self.mark_dirty(user_id);
        Ok(self.commit(Undo::Move {
            user_id,
            direction: direction.opposite(),
            last_moved_at: previous_move,
        }))
    }

    fn apply_join(&mut self, user_id: UserId) -> Result<u64, RoomError> {
        let undo = match self.participants.get(&user_id) {
            Some(p) if p.active => return Err(RoomError::AlreadyActive(user_id)),
            Some(p) => {
                let previous_position = p.position;
                let position = self.find_free(previous_position)?;
                self.occupancy.insert(position.cell(), user_id);
                if let Some(p) = self.participants.get_mut(&user_id) {
                    p.active = true;
                    p.position = position;
                }
                Undo::Deactivate {
                    user_id,
                    previous_position,
                }
            }
            None => {
                let position = self.find_free(Position::from_cell(self.map.spawn))?;
                self.occupancy.insert(position.cell(), user_id);
                self.participants.insert(
                    user_id,
                    Participant::new(user_id, position, Direction::default()),
                );
                Undo::Remove { user_id }
            }
        };
        self.mark_dirty(user_id);
        Ok(self.commit(undo))
    }

    fn apply_exit(&mut self, user_id: UserId) -> Result<u64, RoomError> {
        let participant = self
            .participants
            .get_mut(&user_id)
            .ok_or(RoomError::NotFound(user_id))?;
        if !participant.active {
            return Err(RoomError::NotActive(user_id));
        }
        participant.active = false;
        let cell = participant.position.cell();
        self.vacate(user_id, cell);
        self.mark_dirty(user_id);
        Ok(self.commit(Undo::Reactivate { user_id }))
    }

    fn check_legal(&self, position: Position) -> Result<(), RoomError> {
        for cell in position.corner_cells() {
            if !self.map.in_bounds(cell) {
                return Err(RoomError::OutOfBounds(cell.0, cell.1));
            }
            if self.map.is_blocked(cell) {
                return Err(RoomError::Blocked(cell.0, cell.1));
            }
        }
        Ok(())
    }

    fn is_free(&self, position: Position) -> bool {
        self.map.is_clear(position) && !self.occupancy.contains_key(&position.cell())
    }

    /// `start` when it is free, otherwise the nearest free cell by BFS.
    fn find_free(&self, start: Position) -> Result<Position, RoomError> {
        if self.is_free(start) {
            return Ok(start);
        }

        let origin = start.cell();
        let mut seen: HashSet<Cell> = HashSet::from([origin]);
        let mut queue: VecDeque<Cell> = VecDeque::from([origin]);
        while let Some((cx, cy)) = queue.pop_front() {
            for direction in Direction::ALL {
                let (dx, dy) = direction.delta();
                let next = (cx + dx, cy + dy);
                if !self.map.in_bounds(next) || !seen.insert(next) {
                    continue;
                }
                let candidate = Position::from_cell(next);
                if self.is_free(candidate) {
                    return Ok(candidate);
                }
                queue.push_back(next);
            }
        }
        Err(RoomError::NoFreeCell)
    }

    /// Nearest free cell around `position`, falling back to a search from spawn
    /// when `position` lies too far outside the map to reach any cell.
    fn relocate(&self, position: Position) -> Result<Position, RoomError> {
        self.find_free(position)
            .or_else(|_| self.find_free(Position::from_cell(self.map.spawn)))
    }

    fn occupy(&mut self, user_id: UserId, from: Position, to: Position) {
        self.vacate(user_id, from.cell());
        self.occupancy.insert(to.cell(), user_id);
    }

    fn vacate(&mut self, user_id: UserId, cell: Cell) {
        if self.occupancy.get(&cell) == Some(&user_id) {
            self.occupancy.remove(&cell);
        }
    }

    fn mark_dirty(&mut self, user_id: UserId) {
        if let Some(p) = self.participants.get(&user_id) {
            self.pending.insert(user_id, p.diff_record());
        }
    }

    fn commit(&mut self, undo: Undo) -> u64 {
        self.version += 1;
        self.history.push_front(HistoryEntry {
            version: self.version,
            undo,
        });
        self.history.truncate(self.history_limit);
        self.version
    }

    /// Active participants and the current version.
    pub fn serialize(&self) -> Snapshot {
        let mut participants: Vec<ParticipantView> = self
            .participants
            .values()
            .filter(|p| p.active)
            .map(Participant::view)
            .collect();
        participants.sort_by_key(|p| p.user_id);
        Snapshot {
            version: self.version,
            participants,
        }
    }

    /// Drains every participant touched since the previous call.
    pub fn diff(&mut self) -> Vec<DiffRecord> {
        let mut records: Vec<DiffRecord> = self.pending.drain().map(|(_, r)| r).collect();
        records.sort_by_key(|r| r.user_id);
        records
    }

    /// Puts back records whose flush failed. Newer pending records for the same
    /// participant win.
    pub fn requeue_diff<I: IntoIterator<Item = DiffRecord>>(&mut self, records: I) {
        for record in records {
            self.pending.entry(record.user_id).or_insert(record);
        }
    }

    /// A read-only copy of the room as it was at `version`.
    pub fn revert_to(&self, version: u64) -> Result<RoomState, RoomError> {
        if version > self.version {
            return Err(RoomError::FutureVersion {
                requested: version,
                current: self.version,
            });
        }
        let depth = self.version - version;
        if depth > self.history.len() as u64 {
            return Err(RoomError::HistoryExhausted {
                requested: depth,
                available: self.history.len(),
            });
        }

        let mut view = self.clone();
        view.pending.clear();
        for _ in 0..depth {
            if let Some(entry) = view.history.pop_front() {
                debug_assert_eq!(entry.version, view.version);
                view.undo(entry.undo);
                view.version -= 1;
            }
        }
        Ok(view)
    }

    fn undo(&mut self, undo: Undo) {
        match undo {
            Undo::Move {
                user_id,
                direction,
                last_moved_at,
            } => {
                let Some(from) = self.participants.get(&user_id).map(|p| p.position) else {
                    return;
                };
                let to = from.step(direction);
                self.occupy(user_id, from, to);
                if let Some(p) = self.participants.get_mut(&user_id) {
                    p.position = to;
                    // the move itself faced away from the undo step
                    p.direction = direction.opposite();
                    p.last_moved_at = last_moved_at;
                }
            }
            Undo::Remove { user_id } => {
                if let Some(p) = self.participants.remove(&user_id) {
                    self.vacate(user_id, p.position.cell());
                }
            }
            Undo::Deactivate {
                user_id,
                previous_position,
            } => {
                let Some(current) = self.participants.get(&user_id).map(|p| p.position) else {
                    return;
                };
                self.vacate(user_id, current.cell());
                if let Some(p) = self.participants.get_mut(&user_id) {
                    p.active = false;
                    p.position = previous_position;
                }
            }
            Undo::Reactivate { user_id } => {
                if let Some(p) = self.participants.get_mut(&user_id) {
                    p.active = true;
                    let cell = p.position.cell();
                    self.occupancy.insert(cell, user_id);
                }
            }
        }
    }
}
