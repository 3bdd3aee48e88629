use std::collections::HashMap;

use quorum_types::EntityId;

use crate::state::EntityState;
use crate::store::RecordStore;

/// In-memory, HashMap-based record store.
///
/// The default backend for the engine. Memory is released as soon as an
/// entity is removed.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    entities: HashMap<EntityId, EntityState>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resident ids in sorted order.
    pub fn ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.entities.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Drop every resident entity.
    pub fn clear(&mut self) {
        self.entities.clear();
    }
}

impl RecordStore for InMemoryRecordStore {
    fn get_or_create(&mut self, id: &EntityId) -> &mut EntityState {
        self.entities.entry(id.clone()).or_default()
    }

    fn get(&self, id: &EntityId) -> Option<&EntityState> {
        self.entities.get(id)
    }

    fn remove(&mut self, id: &EntityId) -> Option<EntityState> {
        self.entities.remove(id)
    }

    fn for_each_entity(&self, f: &mut dyn FnMut(&EntityId, &EntityState)) {
        for (id, state) in &self.entities {
            f(id, state);
        }
    }

    fn len(&self) -> usize {
        self.entities.len()
    }
}
