use std::collections::HashMap;

use quorum_types::{FieldMap, SourceId, SourceKind};

/// Partial data held for one entity while it waits to merge.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntityState {
    data_by_source: HashMap<SourceId, FieldMap>,
    required_seen: usize,
    optional_seen: usize,
}

impl EntityState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `fields` as the latest data from `source`.
    ///
    /// Counts move only on the first write from a source; later writes
    /// replace that source's fields wholesale. Returns `true` for a first
    /// write.
    pub fn record(&mut self, source: &SourceId, kind: SourceKind, fields: FieldMap) -> bool {
        let first = self.data_by_source.insert(source.clone(), fields).is_none();
        if first {
            match kind {
                SourceKind::Required => self.required_seen += 1,
                SourceKind::Optional => self.optional_seen += 1,
            }
        }
        first
    }

    /// Latest fields written by `source`, if any.
    pub fn fields_from(&self, source: &str) -> Option<&FieldMap> {
        self.data_by_source.get(source)
    }

    pub fn has(&self, source: &str) -> bool {
        self.data_by_source.contains_key(source)
    }

    pub fn required_seen(&self) -> usize {
        self.required_seen
    }

    pub fn optional_seen(&self) -> usize {
        self.optional_seen
    }

    /// Sources that have written, in no particular order.
    pub fn sources(&self) -> impl Iterator<Item = &SourceId> {
        self.data_by_source.keys()
    }
}
