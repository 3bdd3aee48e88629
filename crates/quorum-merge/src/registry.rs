use std::collections::HashMap;

use quorum_types::{SourceId, SourceKind};

use crate::error::{MergeError, MergeResult};

/// Fixed classification of every source the engine accepts data from.
///
/// Registration order is significant: required sources in the order given,
/// then optional sources in the order given, is the field priority used when
/// sources disagree.
#[derive(Clone, Debug)]
pub struct SourceRegistry {
    required: Vec<SourceId>,
    optional: Vec<SourceId>,
    kinds: HashMap<SourceId, SourceKind>,
}

impl SourceRegistry {
    /// Build a registry from ordered required and optional source names.
    ///
    /// Fails if any name is invalid or appears more than once across both
    /// lists.
    pub fn new<R, O>(required: R, optional: O) -> MergeResult<Self>
    where
        R: IntoIterator,
        R::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
    {
        let mut registry = Self {
            required: Vec::new(),
            optional: Vec::new(),
            kinds: HashMap::new(),
        };

        for name in required {
            registry.register(name.into(), SourceKind::Required)?;
        }
        for name in optional {
            registry.register(name.into(), SourceKind::Optional)?;
        }

        Ok(registry)
    }

    /// A registry with no optional sources.
    pub fn required_only<R>(required: R) -> MergeResult<Self>
    where
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self::new(required, std::iter::empty::<String>())
    }

    fn register(&mut self, name: String, kind: SourceKind) -> MergeResult<()> {
        let id = SourceId::new(name)?;
        if self.kinds.contains_key(&id) {
            return Err(MergeError::DuplicateSource {
                source_name: id.to_string(),
            });
        }

        self.kinds.insert(id.clone(), kind);
        match kind {
            SourceKind::Required => self.required.push(id),
            SourceKind::Optional => self.optional.push(id),
        }
        Ok(())
    }

    /// Kind of the named source, or `None` if it was never registered.
    pub fn kind_of(&self, source: &str) -> Option<SourceKind> {
        self.kinds.get(source).copied()
    }

    /// Look up a source, failing loudly if it is not registered.
    pub fn resolve(&self, source: &str) -> MergeResult<(&SourceId, SourceKind)> {
        self.kinds
            .get_key_value(source)
            .map(|(id, kind)| (id, *kind))
            .ok_or_else(|| MergeError::UnknownSource {
                source_name: source.to_string(),
            })
    }

    pub fn contains(&self, source: &str) -> bool {
        self.kinds.contains_key(source)
    }

    pub fn required_count(&self) -> usize {
        self.required.len()
    }

    pub fn optional_count(&self) -> usize {
        self.optional.len()
    }

    /// Required sources in registration order.
    pub fn required(&self) -> &[SourceId] {
        &self.required
    }

    /// Optional sources in registration order.
    pub fn optional(&self) -> &[SourceId] {
        &self.optional
    }

    /// Every source in field-priority order.
    pub fn priority_order(&self) -> impl Iterator<Item = (&SourceId, SourceKind)> {
        self.required
            .iter()
            .map(|id| (id, SourceKind::Required))
            .chain(self.optional.iter().map(|id| (id, SourceKind::Optional)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_types::TypeError;

    #[test]
    fn classifies_sources() {
        let registry = SourceRegistry::new(["cdc", "quicksearch"], ["profile"]).unwrap();
        assert_eq!(registry.kind_of("cdc"), Some(SourceKind::Required));
        assert_eq!(registry.kind_of("profile"), Some(SourceKind::Optional));
        assert_eq!(registry.kind_of("spreadsheet"), None);
        assert_eq!(registry.required_count(), 2);
        assert_eq!(registry.optional_count(), 1);
    }

    #[test]
    fn rejects_source_in_both_lists() {
        let error = SourceRegistry::new(["cdc"], ["cdc"]).unwrap_err();
        assert_eq!(
            error,
            MergeError::DuplicateSource {
                source_name: "cdc".into()
            }
        );
    }

    #[test]
    fn rejects_repeat_within_list() {
        let error = SourceRegistry::required_only(["a", "b", "a"]).unwrap_err();
        assert!(matches!(error, MergeError::DuplicateSource { .. }));
    }

    #[test]
    fn rejects_invalid_names() {
        let error = SourceRegistry::required_only([""]).unwrap_err();
        assert_eq!(error, MergeError::InvalidSource(TypeError::EmptySourceName));
    }

    #[test]
    fn resolve_unknown_source_fails() {
        let registry = SourceRegistry::required_only(["a"]).unwrap();
        let error = registry.resolve("b").unwrap_err();
        assert_eq!(
            error,
            MergeError::UnknownSource {
                source_name: "b".into()
            }
        );
    }

    #[test]
    fn priority_order_is_required_then_optional() {
        let registry = SourceRegistry::new(["r2", "r1"], ["o2", "o1"]).unwrap();
        let order: Vec<_> = registry
            .priority_order()
            .map(|(id, _)| id.as_str().to_string())
            .collect();
        assert_eq!(order, vec!["r2", "r1", "o2", "o1"]);
    }
}
