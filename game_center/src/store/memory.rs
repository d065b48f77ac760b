use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use parking_lot::Mutex;
use room_core::{EngineId, RoomId};

use super::OwnershipStore;
use crate::scheduler::SchedulerError;

/// In-process ownership table for tests and local runs.
#[derive(Clone, Default)]
pub struct MemoryOwnershipStore {
    owners: Arc<Mutex<HashMap<RoomId, Option<EngineId>>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryOwnershipStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, room_id: RoomId, engine_id: Option<EngineId>) {
        self.owners.lock().insert(room_id, engine_id);
    }

    pub fn owner(&self, room_id: &RoomId) -> Option<EngineId> {
        self.owners.lock().get(room_id).cloned().flatten()
    }

    /// Makes every call fail until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), SchedulerError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SchedulerError::StoreUnavailable);
        }
        Ok(())
    }
}

#[async_trait]
impl OwnershipStore for MemoryOwnershipStore {
    async fn load_assignments(&self) -> Result<Vec<(RoomId, Option<EngineId>)>, SchedulerError> {
        self.check()?;
        let mut rows: Vec<_> = self
            .owners
            .lock()
            .iter()
            .map(|(room_id, owner)| (*room_id, owner.clone()))
            .collect();
        rows.sort_by_key(|(room_id, _)| *room_id);
        Ok(rows)
    }

    async fn set_owner(
        &self,
        room_id: RoomId,
        engine_id: Option<EngineId>,
    ) -> Result<(), SchedulerError> {
        self.check()?;
        // rooms created on the bus may not have been seeded here
        self.owners.lock().insert(room_id, engine_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok, block_on};
    use uuid::Uuid;

    #[test]
    fn owner_writes_are_visible_to_the_next_load() {
        let store = MemoryOwnershipStore::new();
        let room_id = Uuid::new_v4();
        store.insert(room_id, None);

        assert_ok!(block_on(store.set_owner(room_id, Some("e1".into()))));
        let rows = assert_ok!(block_on(store.load_assignments()));
        assert_eq!(rows, vec![(room_id, Some("e1".to_string()))]);

        store.set_unavailable(true);
        assert_err!(block_on(store.load_assignments()));
        assert_eq!(store.owner(&room_id).as_deref(), Some("e1"));
    }
}
