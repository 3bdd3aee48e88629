//! Incremental multi-source merge engine for Quorum.
//!
//! Records describing the same entity arrive from several sources in any
//! order. The engine tracks, per entity, which required and optional sources
//! have reported, decides when the entity is complete, resolves conflicting
//! fields by source registration order, and emits exactly one merged record
//! per entity before purging its state.
//!
//! This crate provides:
//! - [`SourceRegistry`] classifying sources as required or optional
//! - [`EntityState`] and the [`RecordStore`] boundary with an in-memory backend
//! - [`CompletionPolicy`] deciding readiness against [`ExhaustionState`]
//! - [`MergeEngine`] orchestrating updates, exhaustion sweeps, and queries
//! - [`MergeObserver`] notification boundary plus channel and recording observers
//!
//! The engine is single-threaded. Callers with concurrent producers must
//! serialize `update` and `source_exhausted` calls; an entity whose required
//! sources never all report stays resident until the caller evicts it.

pub mod engine;
pub mod error;
pub mod event;
pub mod memory;
pub mod policy;
pub mod registry;
pub mod resolve;
pub mod seen;
pub mod state;
pub mod store;

pub use engine::{MergeEngine, UpdateOutcome};
pub use error::{MergeError, MergeResult};
pub use event::{
    ChannelObserver, MergeObserver, MergedRecord, Notification, ProgressEvent, Recording,
    RecordingObserver,
};
pub use memory::InMemoryRecordStore;
pub use policy::{Completion, CompletionPolicy, ExhaustionState};
pub use registry::SourceRegistry;
pub use resolve::resolve_fields;
pub use seen::SeenIndex;
pub use state::EntityState;
pub use store::RecordStore;
