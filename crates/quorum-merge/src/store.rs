use quorum_types::EntityId;

use crate::state::EntityState;

/// Owner of resident entity state, keyed by entity identifier.
///
/// Implementations are driven from a single caller at a time; mutation takes
/// `&mut self` and no backend is expected to lock internally. Entities leave
/// the store either by merge-and-purge or by explicit eviction.
pub trait RecordStore {
    /// State for `id`, creating an empty one if absent.
    fn get_or_create(&mut self, id: &EntityId) -> &mut EntityState;

    /// State for `id`, or `None` if it is not resident.
    fn get(&self, id: &EntityId) -> Option<&EntityState>;

    /// Remove and return the state for `id`.
    fn remove(&mut self, id: &EntityId) -> Option<EntityState>;

    /// Visit every resident entity. Visiting order is backend-defined.
    fn for_each_entity(&self, f: &mut dyn FnMut(&EntityId, &EntityState));

    /// Number of resident entities.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, id: &EntityId) -> bool {
        self.get(id).is_some()
    }
}
