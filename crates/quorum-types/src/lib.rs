//! Foundation types for Quorum.
//!
//! Every other Quorum crate depends on `quorum-types`. The types here carry
//! no merge semantics of their own; they only name things.
//!
//! # Key Types
//!
//! - [`SourceId`]: Validated name of a data source
//! - [`SourceKind`]: Whether a source gates completion or merely contributes
//! - [`EntityId`]: Key shared across sources for the same real-world thing
//! - [`FieldMap`]: Canonical field name to JSON value mapping

pub mod entity;
pub mod error;
pub mod source;

pub use entity::{EntityId, FieldMap};
pub use error::TypeError;
pub use source::{SourceId, SourceKind};
