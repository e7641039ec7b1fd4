//! Graph change-set model
//!
//! The contract between transformation and loading: node and edge
//! upserts keyed by stable merge identities, with explicit per-field
//! merge reducers.

mod changeset;
mod edge;
mod node;

pub use changeset::ChangeSet;
pub use edge::{merge_edge_properties, EdgeType, EdgeUpsert};
pub use node::{merge_node_properties, NodeType, NodeUpsert, Properties, PropertyValue};
