use std::collections::HashSet;

use tracing::{debug, info, warn};

use quorum_types::{EntityId, FieldMap, SourceKind};

use crate::error::MergeResult;
use crate::event::{MergeObserver, MergedRecord, ProgressEvent};
use crate::memory::InMemoryRecordStore;
use crate::policy::{Completion, CompletionPolicy, ExhaustionState};
use crate::registry::SourceRegistry;
use crate::resolve::resolve_fields;
use crate::seen::SeenIndex;
use crate::state::EntityState;
use crate::store::RecordStore;

/// What an [`MergeEngine::update`] call did.
#[derive(Clone, Debug, PartialEq)]
pub enum UpdateOutcome {
    /// Stored; the entity is still waiting on other sources.
    Pending {
        required_seen: usize,
        optional_seen: usize,
    },
    /// Stored, and the entity merged and was purged during this call.
    Merged(MergedRecord),
    /// The entity merged earlier; the update was not applied.
    AlreadyMerged,
}

impl UpdateOutcome {
    pub fn merged(&self) -> Option<&MergedRecord> {
        match self {
            Self::Merged(record) => Some(record),
            _ => None,
        }
    }
}

/// Incremental multi-source merge engine.
///
/// Single-threaded: `update` and `source_exhausted` take `&mut self` and run
/// any resulting merges, including observer callbacks, before returning.
/// Callers with concurrent producers must serialize calls into the engine.
///
/// Merged ids are remembered so that no entity is emitted twice. An entity
/// whose required sources never all report stays resident until the caller
/// evicts it; the engine imposes no timeout.
pub struct MergeEngine<S: RecordStore = InMemoryRecordStore> {
    registry: SourceRegistry,
    policy: CompletionPolicy,
    store: S,
    exhaustion: ExhaustionState,
    seen: SeenIndex,
    merged_ids: HashSet<EntityId>,
    merged: u64,
    observers: Vec<Box<dyn MergeObserver>>,
}

impl MergeEngine {
    /// Create an engine backed by an in-memory store.
    pub fn new(registry: SourceRegistry) -> Self {
        Self::with_store(registry, InMemoryRecordStore::new())
    }
}

impl<S: RecordStore> MergeEngine<S> {
    pub fn with_store(registry: SourceRegistry, store: S) -> Self {
        let policy = CompletionPolicy::for_registry(&registry);
        Self {
            registry,
            policy,
            store,
            exhaustion: ExhaustionState::new(),
            seen: SeenIndex::new(),
            merged_ids: HashSet::new(),
            merged: 0,
            observers: Vec::new(),
        }
    }

    /// Register an observer for progress and merge notifications.
    pub fn add_observer(&mut self, observer: Box<dyn MergeObserver>) {
        self.observers.push(observer);
    }

    /// Builder-style [`Self::add_observer`].
    pub fn with_observer(mut self, observer: Box<dyn MergeObserver>) -> Self {
        self.add_observer(observer);
        self
    }

    /// Drop every registered observer, closing any channels they hold.
    pub fn clear_observers(&mut self) {
        self.observers.clear();
    }

    /// Record `fields` as the latest data from `source` for `id`.
    ///
    /// Fails only if `source` is not registered. If the update completes the
    /// entity, it is merged and purged before this returns.
    pub fn update(
        &mut self,
        source: &str,
        id: impl Into<EntityId>,
        fields: FieldMap,
    ) -> MergeResult<UpdateOutcome> {
        let (source_id, kind) = self.registry.resolve(source)?;
        let source_id = source_id.clone();
        let id = id.into();

        if self.merged_ids.contains(&id) {
            self.seen.record(&source_id, &id);
            warn!(source = %source_id, entity = %id, "update for already merged entity ignored");
            // The entity is no longer resident, so nothing counts as seen.
            self.notify_progress(ProgressEvent {
                source: source_id,
                entity: id,
                fields,
                required_seen: 0,
                optional_seen: 0,
            });
            return Ok(UpdateOutcome::AlreadyMerged);
        }

        if self.exhaustion.contains(source_id.as_str()) {
            warn!(source = %source_id, entity = %id, "update from exhausted source");
        }

        let progress = (!self.observers.is_empty()).then(|| fields.clone());

        let state = self.store.get_or_create(&id);
        let first = state.record(&source_id, kind, fields);
        let (required_seen, optional_seen) = (state.required_seen(), state.optional_seen());
        let completion = self.policy.evaluate(state, &self.exhaustion);

        if first {
            self.seen.record(&source_id, &id);
        }

        debug!(
            source = %source_id,
            entity = %id,
            first,
            required_seen,
            optional_seen,
            ?completion,
            "update applied"
        );

        if let Some(fields) = progress {
            self.notify_progress(ProgressEvent {
                source: source_id,
                entity: id.clone(),
                fields,
                required_seen,
                optional_seen,
            });
        }

        if completion.is_ready() {
            if let Some(record) = self.merge(&id) {
                return Ok(UpdateOutcome::Merged(record));
            }
        }

        Ok(UpdateOutcome::Pending {
            required_seen,
            optional_seen,
        })
    }

    /// Declare that `source` will send no further updates.
    ///
    /// Repeat calls are no-ops. When the last optional source is exhausted,
    /// every resident entity whose required sources have all reported is
    /// merged; those records are returned in entity id order.
    pub fn source_exhausted(&mut self, source: &str) -> MergeResult<Vec<MergedRecord>> {
        let (source_id, kind) = self.registry.resolve(source)?;

        if !self.exhaustion.mark(source_id, kind) {
            debug!(source = %source_id, "duplicate exhaustion signal");
            return Ok(Vec::new());
        }

        info!(
            source = %source_id,
            %kind,
            exhausted_optional = self.exhaustion.exhausted_optional(),
            optional_count = self.registry.optional_count(),
            "source exhausted"
        );

        // Required exhaustion has no completion effect; required sources
        // gate purely on per-entity counts.
        if kind == SourceKind::Optional && self.policy.all_optional_exhausted(&self.exhaustion) {
            return Ok(self.flush());
        }

        Ok(Vec::new())
    }

    /// Merge every resident entity that now satisfies the policy.
    fn flush(&mut self) -> Vec<MergedRecord> {
        let mut ready = Vec::new();
        let policy = self.policy;
        let exhaustion = &self.exhaustion;
        self.store.for_each_entity(&mut |id, state| {
            if policy.is_complete(state, exhaustion) {
                ready.push(id.clone());
            }
        });
        ready.sort();

        let merged: Vec<MergedRecord> = ready.iter().filter_map(|id| self.merge(id)).collect();
        info!(
            merged = merged.len(),
            resident = self.store.len(),
            "flush sweep complete"
        );
        merged
    }

    fn notify_progress(&mut self, event: ProgressEvent) {
        for observer in &mut self.observers {
            observer.on_progress(&event);
        }
    }

    /// Resolve, notify, and purge a single entity.
    fn merge(&mut self, id: &EntityId) -> Option<MergedRecord> {
        let state = self.store.remove(id)?;
        let record = MergedRecord {
            entity: id.clone(),
            fields: resolve_fields(&self.registry, &state),
        };

        self.merged += 1;
        self.merged_ids.insert(id.clone());
        debug!(entity = %id, fields = record.fields.len(), "entity merged");

        for observer in &mut self.observers {
            observer.on_merged(&record);
        }
        Some(record)
    }

    /// Whether `source` has data for `id` that has not been merged yet.
    pub fn has(&self, source: &str, id: &EntityId) -> bool {
        self.store.get(id).is_some_and(|state| state.has(source))
    }

    /// `source`'s latest fields for a resident `id`.
    pub fn get(&self, source: &str, id: &EntityId) -> Option<&FieldMap> {
        self.store.get(id).and_then(|state| state.fields_from(source))
    }

    /// Every id `source` ever wrote, including merged ones, in first-seen
    /// order.
    pub fn ids_seen(&self, source: &str) -> MergeResult<&[EntityId]> {
        self.registry.resolve(source)?;
        Ok(self.seen.ids(source))
    }

    /// Resident state for `id`.
    pub fn state(&self, id: &EntityId) -> Option<&EntityState> {
        self.store.get(id)
    }

    /// Resident ids with their standing against the completion rules, in id
    /// order.
    pub fn pending(&self) -> Vec<(EntityId, Completion)> {
        let mut pending = Vec::with_capacity(self.store.len());
        self.store.for_each_entity(&mut |id, state| {
            pending.push((id.clone(), self.policy.evaluate(state, &self.exhaustion)));
        });
        pending.sort_by(|a, b| a.0.cmp(&b.0));
        pending
    }

    /// Drop a resident entity without merging it.
    ///
    /// For callers that bound memory with their own timeout policy. The id
    /// is not marked merged, so later updates start a fresh entity.
    pub fn evict(&mut self, id: &EntityId) -> Option<EntityState> {
        let evicted = self.store.remove(id);
        if evicted.is_some() {
            info!(entity = %id, "entity evicted");
        }
        evicted
    }

    /// Whether an entity has already been merged.
    pub fn is_merged(&self, id: &EntityId) -> bool {
        self.merged_ids.contains(id)
    }

    pub fn is_exhausted(&self, source: &str) -> bool {
        self.exhaustion.contains(source)
    }

    /// Total merges performed.
    pub fn merged_count(&self) -> u64 {
        self.merged
    }

    /// Entities currently held in the store.
    pub fn resident_count(&self) -> usize {
        self.store.len()
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn exhaustion(&self) -> &ExhaustionState {
        &self.exhaustion
    }
}
