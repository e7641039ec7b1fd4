//! Node upserts in the graph change-set

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::normalize::prefer_display;

/// The four node labels in the trial graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Trial,
    Organization,
    Drug,
    Condition,
}

impl NodeType {
    pub const ALL: [NodeType; 4] = [
        NodeType::Trial,
        NodeType::Organization,
        NodeType::Drug,
        NodeType::Condition,
    ];

    /// Label as persisted in the store.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Trial => "Trial",
            Self::Organization => "Organization",
            Self::Drug => "Drug",
            Self::Condition => "Condition",
        }
    }

    /// Name of the unique merge-key field for this node type.
    pub fn key_field(&self) -> &'static str {
        match self {
            Self::Trial => "nct_id",
            Self::Organization => "org_key",
            Self::Drug => "drug_key",
            Self::Condition => "condition_key",
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Typed property values carried on nodes and edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Property map. Ordered so serialized forms and iteration are stable.
pub type Properties = BTreeMap<String, PropertyValue>;

/// One node upsert: merge identity plus the attributes known this run.
/// Absent attributes are simply missing from the map, which is what
/// keeps merges from erasing previously loaded values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeUpsert {
    pub node_type: NodeType,
    pub key: String,
    pub properties: Properties,
}

impl NodeUpsert {
    pub fn new(node_type: NodeType, key: impl Into<String>) -> Self {
        Self {
            node_type,
            key: key.into(),
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, field: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(field.into(), value.into());
        self
    }

    /// Insert only when the value is present. Keeps optional source
    /// columns out of the map entirely.
    pub fn with_optional<V: Into<PropertyValue>>(
        mut self,
        field: impl Into<String>,
        value: Option<V>,
    ) -> Self {
        if let Some(value) = value {
            self.properties.insert(field.into(), value.into());
        }
        self
    }
}

/// Merge incoming node properties into an existing map.
///
/// Policy: last-write-wins per field, with one exception — the `name`
/// field only moves to a higher-quality display variant, so a populated
/// name never regresses to a truncated or all-caps one.
pub fn merge_node_properties(existing: &mut Properties, incoming: &Properties) {
    for (field, value) in incoming {
        if field == "name" {
            let current = existing
                .get(field)
                .and_then(PropertyValue::as_str)
                .unwrap_or("");
            let candidate = value.as_str().unwrap_or("");
            if !prefer_display(current, candidate) {
                continue;
            }
        }
        existing.insert(field.clone(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_properties_stay_absent() {
        let node = NodeUpsert::new(NodeType::Trial, "NCT1")
            .with_property("brief_title", "A Study")
            .with_optional("enrollment", None::<i64>)
            .with_optional("number_of_arms", Some(2));
        assert!(node.properties.contains_key("brief_title"));
        assert!(!node.properties.contains_key("enrollment"));
        assert_eq!(node.properties.get("number_of_arms"), Some(&PropertyValue::Int(2)));
    }

    #[test]
    fn merge_is_last_write_wins_per_field() {
        let mut existing = NodeUpsert::new(NodeType::Trial, "NCT1")
            .with_property("overall_status", "RECRUITING")
            .with_property("enrollment", 100)
            .properties;
        let incoming = NodeUpsert::new(NodeType::Trial, "NCT1")
            .with_property("overall_status", "COMPLETED")
            .properties;
        merge_node_properties(&mut existing, &incoming);
        assert_eq!(existing.get("overall_status"), Some(&"COMPLETED".into()));
        // Fields absent from the incoming map survive.
        assert_eq!(existing.get("enrollment"), Some(&PropertyValue::Int(100)));
    }

    #[test]
    fn merge_never_regresses_a_display_name() {
        let mut existing = NodeUpsert::new(NodeType::Organization, "pfizer")
            .with_property("name", "Pfizer")
            .properties;
        let incoming = NodeUpsert::new(NodeType::Organization, "pfizer")
            .with_property("name", "PFIZER")
            .properties;
        merge_node_properties(&mut existing, &incoming);
        assert_eq!(existing.get("name"), Some(&"Pfizer".into()));

        // A richer variant still wins.
        let richer = NodeUpsert::new(NodeType::Organization, "pfizer")
            .with_property("name", "Pfizer Pharmaceuticals")
            .properties;
        merge_node_properties(&mut existing, &richer);
        assert_eq!(existing.get("name"), Some(&"Pfizer Pharmaceuticals".into()));
    }
}
