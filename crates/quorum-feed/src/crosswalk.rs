use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use quorum_types::{EntityId, FieldMap};

/// How to extract one canonical field from a raw row.
///
/// Rows are JSON values: objects for keyed sources, arrays for positional
/// (CSV-like) sources. A rule that finds nothing yields `None`, and the field
/// is left out of the record.
#[derive(Clone, Debug, Deserialize)]
#[serde(from = "RuleSpec")]
pub enum FieldRule {
    /// Look up a key in an object row.
    Key(String),
    /// Index into an array row.
    Position(usize),
    /// Derive the value from other parts of the row.
    Computed(Computation),
}

/// Derived field values.
#[derive(Clone, Debug)]
pub enum Computation {
    /// Text of each part that resolves, joined by `separator`.
    Join {
        parts: Vec<FieldRule>,
        separator: String,
    },
    /// Text of `rule`, cut to at most `max_chars` characters.
    Truncate {
        rule: Box<FieldRule>,
        max_chars: usize,
    },
    /// Text of `rule` mapped through a fixed table; misses yield nothing.
    Lookup {
        rule: Box<FieldRule>,
        table: BTreeMap<String, Value>,
    },
    /// The same value for every row.
    Constant(Value),
    /// Arbitrary function of the whole row, for embedders.
    Custom(CustomFn),
}

/// A computed-field function supplied in code.
#[derive(Clone)]
pub struct CustomFn(Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>);

impl CustomFn {
    pub fn new(f: impl Fn(&Value) -> Option<Value> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }
}

impl fmt::Debug for CustomFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomFn(..)")
    }
}

/// Configuration form of [`FieldRule`]: one key naming the rule.
#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum RuleSpec {
    Key(String),
    Position(usize),
    Join {
        parts: Vec<FieldRule>,
        #[serde(default = "default_separator")]
        separator: String,
    },
    Truncate {
        rule: Box<FieldRule>,
        max_chars: usize,
    },
    Lookup {
        rule: Box<FieldRule>,
        table: BTreeMap<String, Value>,
    },
    Constant(Value),
}

fn default_separator() -> String {
    " ".to_string()
}

impl From<RuleSpec> for FieldRule {
    fn from(spec: RuleSpec) -> Self {
        match spec {
            RuleSpec::Key(key) => Self::Key(key),
            RuleSpec::Position(index) => Self::Position(index),
            RuleSpec::Join { parts, separator } => {
                Self::Computed(Computation::Join { parts, separator })
            }
            RuleSpec::Truncate { rule, max_chars } => {
                Self::Computed(Computation::Truncate { rule, max_chars })
            }
            RuleSpec::Lookup { rule, table } => Self::Computed(Computation::Lookup { rule, table }),
            RuleSpec::Constant(value) => Self::Computed(Computation::Constant(value)),
        }
    }
}

impl FieldRule {
    pub fn key(key: impl Into<String>) -> Self {
        Self::Key(key.into())
    }

    pub fn position(index: usize) -> Self {
        Self::Position(index)
    }

    pub fn custom(f: impl Fn(&Value) -> Option<Value> + Send + Sync + 'static) -> Self {
        Self::Computed(Computation::Custom(CustomFn::new(f)))
    }

    /// Apply the rule to `row`.
    pub fn resolve(&self, row: &Value) -> Option<Value> {
        match self {
            Self::Key(key) => row.as_object()?.get(key).filter(|v| !v.is_null()).cloned(),
            Self::Position(index) => row.as_array()?.get(*index).filter(|v| !v.is_null()).cloned(),
            Self::Computed(computation) => computation.resolve(row),
        }
    }

    fn resolve_text(&self, row: &Value) -> Option<String> {
        self.resolve(row).as_ref().and_then(text_of)
    }
}

impl Computation {
    fn resolve(&self, row: &Value) -> Option<Value> {
        match self {
            Self::Join { parts, separator } => {
                let texts: Vec<String> = parts
                    .iter()
                    .filter_map(|part| part.resolve_text(row))
                    .filter(|text| !text.is_empty())
                    .collect();
                if texts.is_empty() {
                    None
                } else {
                    Some(Value::String(texts.join(separator)))
                }
            }
            Self::Truncate { rule, max_chars } => {
                let text = rule.resolve_text(row)?;
                Some(Value::String(text.chars().take(*max_chars).collect()))
            }
            Self::Lookup { rule, table } => {
                let key = rule.resolve_text(row)?;
                table.get(&key).cloned()
            }
            Self::Constant(value) => Some(value.clone()),
            Self::Custom(CustomFn(f)) => f(row),
        }
    }
}

/// Scalar text form used by computed rules. Numbers are stringified so a
/// positional `82` and a keyed `"82"` behave alike.
fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Keep only rows whose resolved value is one of `any_of`.
#[derive(Clone, Debug, Deserialize)]
pub struct RowFilter {
    pub rule: FieldRule,
    pub any_of: Vec<String>,
}

impl RowFilter {
    pub fn new(rule: FieldRule, any_of: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            rule,
            any_of: any_of.into_iter().map(Into::into).collect(),
        }
    }

    pub fn accepts(&self, row: &Value) -> bool {
        self.rule
            .resolve_text(row)
            .is_some_and(|text| self.any_of.iter().any(|allowed| *allowed == text))
    }
}

/// What a crosswalk made of one row.
#[derive(Clone, Debug, PartialEq)]
pub enum RowOutcome {
    Record(EntityId, FieldMap),
    /// Rejected by the row filter.
    Filtered,
    /// The id rule resolved to nothing usable.
    MissingId,
}

/// Per-source mapping from raw rows to canonical records.
#[derive(Clone, Debug)]
pub struct Crosswalk {
    id: FieldRule,
    fields: Vec<(String, FieldRule)>,
    filter: Option<RowFilter>,
}

impl Crosswalk {
    /// A crosswalk that takes the entity id from `id` and maps no fields yet.
    pub fn new(id: FieldRule) -> Self {
        Self {
            id,
            fields: Vec::new(),
            filter: None,
        }
    }

    pub fn field(mut self, name: impl Into<String>, rule: FieldRule) -> Self {
        self.fields.push((name.into(), rule));
        self
    }

    pub fn with_filter(mut self, filter: RowFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Canonical field names this crosswalk can produce.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn apply(&self, row: &Value) -> RowOutcome {
        if let Some(filter) = &self.filter {
            if !filter.accepts(row) {
                return RowOutcome::Filtered;
            }
        }

        let Some(id) = self.id.resolve(row).as_ref().and_then(EntityId::from_json) else {
            return RowOutcome::MissingId;
        };

        let fields = self
            .fields
            .iter()
            .filter_map(|(name, rule)| rule.resolve(row).map(|value| (name.clone(), value)))
            .collect();

        RowOutcome::Record(id, fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cdc_row() -> Value {
        json!([
            "DC820001", "", "", "", "Little Sprouts", "12 Elm St", "Suite 4", "Detroit", "MI",
            "482011234", "313-555-0100", "DC", 82
        ])
    }

    #[test]
    fn key_and_position_rules() {
        let row = json!({"NAME": "Little Sprouts", "STARS": 4, "EMPTY": null});
        assert_eq!(FieldRule::key("NAME").resolve(&row), Some(json!("Little Sprouts")));
        assert_eq!(FieldRule::key("EMPTY").resolve(&row), None);
        assert_eq!(FieldRule::key("MISSING").resolve(&row), None);
        assert_eq!(FieldRule::position(0).resolve(&row), None);

        let row = cdc_row();
        assert_eq!(FieldRule::position(7).resolve(&row), Some(json!("Detroit")));
        assert_eq!(FieldRule::position(99).resolve(&row), None);
        assert_eq!(FieldRule::key("NAME").resolve(&row), None);
    }

    #[test]
    fn join_skips_empty_parts() {
        let rule = FieldRule::Computed(Computation::Join {
            parts: vec![FieldRule::position(5), FieldRule::position(6)],
            separator: " ".into(),
        });
        assert_eq!(rule.resolve(&cdc_row()), Some(json!("12 Elm St Suite 4")));

        let row = json!(["", "", "", "", "", "12 Elm St", ""]);
        assert_eq!(rule.resolve(&row), Some(json!("12 Elm St")));

        let row = json!([]);
        assert_eq!(rule.resolve(&row), None);
    }

    #[test]
    fn truncate_counts_characters() {
        let rule = FieldRule::Computed(Computation::Truncate {
            rule: Box::new(FieldRule::position(9)),
            max_chars: 5,
        });
        assert_eq!(rule.resolve(&cdc_row()), Some(json!("48201")));

        let short = json!(["", "", "", "", "", "", "", "", "", "4820"]);
        assert_eq!(rule.resolve(&short), Some(json!("4820")));
    }

    #[test]
    fn lookup_stringifies_numbers() {
        let mut table = BTreeMap::new();
        table.insert("82".to_string(), json!("Wayne"));
        let rule = FieldRule::Computed(Computation::Lookup {
            rule: Box::new(FieldRule::position(12)),
            table,
        });
        assert_eq!(rule.resolve(&cdc_row()), Some(json!("Wayne")));

        let row = json!(["", "", "", "", "", "", "", "", "", "", "", "", 63]);
        assert_eq!(rule.resolve(&row), None);
    }

    #[test]
    fn custom_rule_sees_whole_row() {
        let rule = FieldRule::custom(|row| row.as_array().map(|cells| json!(cells.len())));
        assert_eq!(rule.resolve(&cdc_row()), Some(json!(13)));
    }

    #[test]
    fn crosswalk_builds_record() {
        let crosswalk = Crosswalk::new(FieldRule::position(0))
            .field("LicenseNumber", FieldRule::position(0))
            .field("BusinessName", FieldRule::position(4))
            .field("Fax", FieldRule::position(40));

        let RowOutcome::Record(id, fields) = crosswalk.apply(&cdc_row()) else {
            panic!("expected a record");
        };
        assert_eq!(id, EntityId::from("DC820001"));
        assert_eq!(fields["BusinessName"], json!("Little Sprouts"));
        assert!(!fields.contains_key("Fax"));
        assert_eq!(crosswalk.field_names().count(), 3);
    }

    #[test]
    fn crosswalk_filters_rows() {
        let crosswalk = Crosswalk::new(FieldRule::position(0))
            .with_filter(RowFilter::new(FieldRule::position(12), ["82", "50", "63"]));
        assert!(matches!(crosswalk.apply(&cdc_row()), RowOutcome::Record(..)));

        let elsewhere = json!(["DC1", "", "", "", "", "", "", "", "", "", "", "", 11]);
        assert_eq!(crosswalk.apply(&elsewhere), RowOutcome::Filtered);
    }

    #[test]
    fn crosswalk_reports_missing_id() {
        let crosswalk = Crosswalk::new(FieldRule::key("LICENSEID"));
        assert_eq!(crosswalk.apply(&json!({"NAME": "x"})), RowOutcome::MissingId);
        assert_eq!(crosswalk.apply(&json!({"LICENSEID": ""})), RowOutcome::MissingId);
    }

    #[test]
    fn rules_deserialize_from_config_form() {
        let rule: FieldRule = serde_json::from_value(json!({
            "join": { "parts": [{ "position": 5 }, { "key": "Suite" }] }
        }))
        .unwrap();
        let FieldRule::Computed(Computation::Join { parts, separator }) = rule else {
            panic!("expected join");
        };
        assert_eq!(parts.len(), 2);
        assert_eq!(separator, " ");

        let rule: FieldRule = serde_json::from_value(json!({ "constant": "MI" })).unwrap();
        assert_eq!(rule.resolve(&json!({})), Some(json!("MI")));

        let rule: FieldRule = serde_json::from_value(json!({
            "lookup": { "rule": { "key": "T" }, "table": { "DC": "Center" } }
        }))
        .unwrap();
        assert_eq!(rule.resolve(&json!({"T": "DC"})), Some(json!("Center")));
    }
}
