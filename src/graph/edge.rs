//! Edge upserts in the graph change-set

use serde::{Deserialize, Serialize};

use super::node::{NodeType, Properties, PropertyValue};

/// The four relationship types. Trial is always the source endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EdgeType {
    SponsoredBy,
    CollaboratesWith,
    Investigates,
    Targets,
}

impl EdgeType {
    pub const ALL: [EdgeType; 4] = [
        EdgeType::SponsoredBy,
        EdgeType::CollaboratesWith,
        EdgeType::Investigates,
        EdgeType::Targets,
    ];

    /// Relationship label as persisted in the store.
    pub fn label(&self) -> &'static str {
        match self {
            Self::SponsoredBy => "SPONSORED_BY",
            Self::CollaboratesWith => "COLLABORATES_WITH",
            Self::Investigates => "INVESTIGATES",
            Self::Targets => "TARGETS",
        }
    }

    /// (source, target) node types for this relationship.
    pub fn endpoints(&self) -> (NodeType, NodeType) {
        match self {
            Self::SponsoredBy | Self::CollaboratesWith => (NodeType::Trial, NodeType::Organization),
            Self::Investigates => (NodeType::Trial, NodeType::Drug),
            Self::Targets => (NodeType::Trial, NodeType::Condition),
        }
    }

    /// A trial has at most one edge of this type. On merge, an upsert
    /// with a different target replaces the old edge instead of adding
    /// a second one.
    pub fn single_target(&self) -> bool {
        matches!(self, Self::SponsoredBy)
    }
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One edge upsert, identified by the (type, from, to) triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeUpsert {
    pub edge_type: EdgeType,
    pub from: String,
    pub to: String,
    pub properties: Properties,
}

impl EdgeUpsert {
    pub fn new(edge_type: EdgeType, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            edge_type,
            from: from.into(),
            to: to.into(),
            properties: Properties::new(),
        }
    }

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

/// Merge incoming edge properties into an existing map: last-write-wins
/// per field. A field absent from the incoming map is left untouched,
/// so a populated attribute is never erased by a sparser later snapshot.
pub fn merge_edge_properties(existing: &mut Properties, incoming: &Properties) {
    for (field, value) in incoming {
        existing.insert(field.clone(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_trial_sourced() {
        for edge_type in EdgeType::ALL {
            assert_eq!(edge_type.endpoints().0, NodeType::Trial);
        }
        assert_eq!(EdgeType::Investigates.endpoints().1, NodeType::Drug);
        assert_eq!(EdgeType::Targets.endpoints().1, NodeType::Condition);
    }

    #[test]
    fn only_the_lead_sponsor_edge_is_single_target() {
        assert!(EdgeType::SponsoredBy.single_target());
        assert!(!EdgeType::CollaboratesWith.single_target());
        assert!(!EdgeType::Investigates.single_target());
    }

    #[test]
    fn sparse_snapshots_do_not_erase_edge_attributes() {
        let mut existing = EdgeUpsert::new(EdgeType::Investigates, "NCT1", "aspirin")
            .with_optional("route", Some("ORAL"))
            .properties;
        let incoming = EdgeUpsert::new(EdgeType::Investigates, "NCT1", "aspirin")
            .with_optional("dosage_form", Some("TABLET"))
            .properties;
        merge_edge_properties(&mut existing, &incoming);
        assert_eq!(existing.get("route"), Some(&"ORAL".into()));
        assert_eq!(existing.get("dosage_form"), Some(&"TABLET".into()));
    }
}
