use std::collections::HashSet;

use quorum_types::{SourceId, SourceKind};

use crate::registry::SourceRegistry;
use crate::state::EntityState;

/// Sources that have declared they will send no more data.
#[derive(Clone, Debug, Default)]
pub struct ExhaustionState {
    exhausted: HashSet<SourceId>,
    required: usize,
    optional: usize,
}

impl ExhaustionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `source` exhausted. Returns `false` if it already was.
    pub fn mark(&mut self, source: &SourceId, kind: SourceKind) -> bool {
        if !self.exhausted.insert(source.clone()) {
            return false;
        }
        match kind {
            SourceKind::Required => self.required += 1,
            SourceKind::Optional => self.optional += 1,
        }
        true
    }

    pub fn contains(&self, source: &str) -> bool {
        self.exhausted.contains(source)
    }

    pub fn exhausted_required(&self) -> usize {
        self.required
    }

    pub fn exhausted_optional(&self) -> usize {
        self.optional
    }
}

/// Where an entity stands against the completion rules.
///
/// Both ready variants lead to the same merge; the distinction exists for
/// diagnostics and never reaches merge notifications.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    /// At least one required source has not reported.
    AwaitingRequired,
    /// Every required and every optional source has reported.
    Complete,
    /// Required sources reported and every optional source is exhausted.
    Flushable,
    /// Required sources reported; optional sources are still active.
    AwaitingOptional,
}

impl Completion {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Complete | Self::Flushable)
    }
}

/// Decides when an entity is ready to merge.
///
/// Required sources always gate completion. Optional sources only get a
/// chance to report: once all of them are exhausted, an entity with its
/// required sources satisfied merges with whatever optional data it has.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompletionPolicy {
    required_count: usize,
    optional_count: usize,
}

impl CompletionPolicy {
    pub fn new(required_count: usize, optional_count: usize) -> Self {
        Self {
            required_count,
            optional_count,
        }
    }

    pub fn for_registry(registry: &SourceRegistry) -> Self {
        Self::new(registry.required_count(), registry.optional_count())
    }

    /// Classify `state`. Rules are applied in order; the first match wins.
    pub fn evaluate(&self, state: &EntityState, exhaustion: &ExhaustionState) -> Completion {
        if state.required_seen() < self.required_count {
            Completion::AwaitingRequired
        } else if state.optional_seen() == self.optional_count {
            Completion::Complete
        } else if self.all_optional_exhausted(exhaustion) {
            Completion::Flushable
        } else {
            Completion::AwaitingOptional
        }
    }

    pub fn is_complete(&self, state: &EntityState, exhaustion: &ExhaustionState) -> bool {
        self.evaluate(state, exhaustion).is_ready()
    }

    /// `true` once no optional source can send further data.
    pub fn all_optional_exhausted(&self, exhaustion: &ExhaustionState) -> bool {
        exhaustion.exhausted_optional() == self.optional_count
    }
}
