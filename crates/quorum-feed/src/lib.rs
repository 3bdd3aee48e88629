//! Producer layer for Quorum.
//!
//! Producers turn raw rows into `(source, entity, fields)` updates and feed
//! them to a merge engine. This crate provides:
//! - [`Crosswalk`] and [`FieldRule`], a declarative mapping from raw rows to
//!   canonical fields
//! - [`Session`], the explicit authentication context threaded through
//!   every producer call
//! - The [`Producer`] capability with [`JsonLinesProducer`] and
//!   [`StaticProducer`] variants
//! - [`MergeService`], an actor that owns a [`quorum_merge::MergeEngine`] and
//!   serializes updates from concurrent producers
//! - [`PipelineConfig`], TOML pipeline configuration

pub mod config;
pub mod crosswalk;
pub mod error;
pub mod pipeline;
pub mod producer;
pub mod service;
pub mod session;
pub mod sources;

pub use config::{PipelineConfig, SourceConfig};
pub use crosswalk::{Computation, Crosswalk, CustomFn, FieldRule, RowFilter, RowOutcome};
pub use error::{FeedError, FeedResult};
pub use pipeline::{run_all, run_producer, SourceReport};
pub use producer::{ProduceStats, Producer, RecordSink};
pub use service::{MergeHandle, MergeService, ServiceParts, ServiceStats};
pub use session::Session;
pub use sources::{JsonLinesProducer, StaticProducer};
