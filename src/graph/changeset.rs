//! The change-set: one ingestion run's worth of graph mutations
//!
//! A change-set is a set, not a sequence. Node upserts are keyed by
//! (type, key), edge upserts by (type, from, to); inserting the same
//! identity twice merges properties instead of appending. The loader is
//! free to batch and parallelize because nothing here depends on
//! insertion order.

use std::collections::BTreeMap;

use super::edge::{merge_edge_properties, EdgeType, EdgeUpsert};
use super::node::{merge_node_properties, NodeType, NodeUpsert, Properties};

/// Accumulated node and edge upserts for one run.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    nodes: BTreeMap<(NodeType, String), Properties>,
    edges: BTreeMap<(EdgeType, String, String), Properties>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node upsert. If the key is already present, properties
    /// merge via the node merge policy.
    pub fn upsert_node(&mut self, node: NodeUpsert) {
        let slot = self
            .nodes
            .entry((node.node_type, node.key))
            .or_default();
        merge_node_properties(slot, &node.properties);
    }

    /// Add an edge upsert. Returns `false` when the (type, from, to)
    /// identity was already present; properties still merge.
    pub fn upsert_edge(&mut self, edge: EdgeUpsert) -> bool {
        let key = (edge.edge_type, edge.from, edge.to);
        let fresh = !self.edges.contains_key(&key);
        let slot = self.edges.entry(key).or_default();
        merge_edge_properties(slot, &edge.properties);
        fresh
    }

    pub fn contains_node(&self, node_type: NodeType, key: &str) -> bool {
        self.nodes.contains_key(&(node_type, key.to_string()))
    }

    /// All node upserts of one type, ready for batching.
    pub fn nodes_of(&self, node_type: NodeType) -> Vec<NodeUpsert> {
        self.nodes
            .iter()
            .filter(|((t, _), _)| *t == node_type)
            .map(|((t, key), properties)| NodeUpsert {
                node_type: *t,
                key: key.clone(),
                properties: properties.clone(),
            })
            .collect()
    }

    /// All edge upserts of one type, ready for batching.
    pub fn edges_of(&self, edge_type: EdgeType) -> Vec<EdgeUpsert> {
        self.edges
            .iter()
            .filter(|((t, _, _), _)| *t == edge_type)
            .map(|((t, from, to), properties)| EdgeUpsert {
                edge_type: *t,
                from: from.clone(),
                to: to.clone(),
                properties: properties.clone(),
            })
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}
