use std::collections::{HashMap, HashSet};

use quorum_types::{EntityId, SourceId};

/// Every entity id each source has ever written, merged or not.
///
/// Kept apart from the record store because store entries vanish on merge
/// while this history must not.
#[derive(Clone, Debug, Default)]
pub struct SeenIndex {
    by_source: HashMap<SourceId, SeenIds>,
}

#[derive(Clone, Debug, Default)]
struct SeenIds {
    order: Vec<EntityId>,
    members: HashSet<EntityId>,
}

impl SeenIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Note that `source` wrote `id`. Returns `true` the first time.
    pub fn record(&mut self, source: &SourceId, id: &EntityId) -> bool {
        let seen = self.by_source.entry(source.clone()).or_default();
        if !seen.members.insert(id.clone()) {
            return false;
        }
        seen.order.push(id.clone());
        true
    }

    /// Ids written by `source` in first-seen order.
    pub fn ids(&self, source: &str) -> &[EntityId] {
        self.by_source
            .get(source)
            .map(|seen| seen.order.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains(&self, source: &str, id: &EntityId) -> bool {
        self.by_source
            .get(source)
            .is_some_and(|seen| seen.members.contains(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_first_seen_order_without_duplicates() {
        let mut index = SeenIndex::new();
        let source = SourceId::new("ds1").unwrap();

        assert!(index.record(&source, &EntityId::from("b")));
        assert!(index.record(&source, &EntityId::from("a")));
        assert!(!index.record(&source, &EntityId::from("b")));

        assert_eq!(index.ids("ds1"), &[EntityId::from("b"), EntityId::from("a")]);
        assert!(index.contains("ds1", &EntityId::from("a")));
    }

    #[test]
    fn unseen_source_is_empty() {
        let index = SeenIndex::new();
        assert!(index.ids("nobody").is_empty());
        assert!(!index.contains("nobody", &EntityId::from("1")));
    }
}
