use quorum_types::FieldMap;

use crate::registry::SourceRegistry;
use crate::state::EntityState;

/// Build the merged record for `state`.
///
/// Sources are visited in registry priority order and the first source to
/// supply a field wins, including when the value it supplies is `null`.
pub fn resolve_fields(registry: &SourceRegistry, state: &EntityState) -> FieldMap {
    let mut merged = FieldMap::new();

    for (source, _) in registry.priority_order() {
        let Some(fields) = state.fields_from(source.as_str()) else {
            continue;
        };

        for (name, value) in fields {
            merged.entry(name.clone()).or_insert_with(|| value.clone());
        }
    }

    merged
}
