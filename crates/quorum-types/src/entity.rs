use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A record's fields keyed by canonical field name.
///
/// Ordered so that merged output is stable across runs.
pub type FieldMap = BTreeMap<String, serde_json::Value>;

/// Identifier shared by every source describing the same entity,
/// e.g. a license number.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Build an id from a JSON scalar.
    ///
    /// Strings are taken verbatim and numbers use their JSON rendering, so
    /// `1042` and `"1042"` name the same entity. Anything else (null, bool,
    /// arrays, objects, empty strings) is not an identifier.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            serde_json::Value::Number(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u64> for EntityId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_and_string_ids_agree() {
        assert_eq!(EntityId::from_json(&json!(1042)), Some(EntityId::from("1042")));
        assert_eq!(EntityId::from_json(&json!("1042")), Some(EntityId::from(1042u64)));
    }

    #[test]
    fn non_scalar_values_are_not_ids() {
        assert_eq!(EntityId::from_json(&json!(null)), None);
        assert_eq!(EntityId::from_json(&json!("")), None);
        assert_eq!(EntityId::from_json(&json!([1])), None);
        assert_eq!(EntityId::from_json(&json!(true)), None);
    }

    #[test]
    fn serializes_transparently() {
        let id = EntityId::from("DC123");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"DC123\"");
    }

    #[test]
    fn display_is_bare() {
        assert_eq!(format!("{}", EntityId::from(7u64)), "7");
        assert_eq!(format!("{:?}", EntityId::from(7u64)), "EntityId(7)");
    }
}
