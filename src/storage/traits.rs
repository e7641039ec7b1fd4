//! Storage abstraction for the trial graph
//!
//! The loader talks to `GraphStore` and nothing else. Backends supply
//! merge-by-key upserts with the change-set's reducer semantics, plus
//! the uniqueness constraints that make merges well-defined.

use thiserror::Error;

use crate::graph::{EdgeType, EdgeUpsert, NodeType, NodeUpsert, Properties};
use crate::report::UpsertCounts;

/// Errors from storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Whether a retry has any chance of succeeding. Schema and
    /// serialization failures are deterministic; contention and
    /// availability failures are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Database(err) => {
                matches!(
                    err.sqlite_error_code(),
                    Some(rusqlite::ErrorCode::DatabaseBusy)
                        | Some(rusqlite::ErrorCode::DatabaseLocked)
                )
            }
            Self::Unavailable(_) | Self::Io(_) => true,
            Self::Schema(_) | Self::Serialization(_) => false,
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Whether an upsert created the record or merged into an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Merge-by-key graph persistence.
///
/// Upserts are idempotent: reapplying the same change produces the same
/// stored state. Batch variants apply all-or-nothing, so a failed batch
/// can be retried wholesale.
pub trait GraphStore: Send + Sync {
    /// Ensure the uniqueness constraint and secondary indexes for one
    /// node type exist. Must be called before the first upsert.
    fn ensure_constraint(&self, node_type: NodeType) -> StorageResult<()>;

    /// Merge one node by (type, key).
    fn upsert_node(&self, node: &NodeUpsert) -> StorageResult<UpsertOutcome>;

    /// Merge one edge by (type, from, to). For single-target edge types
    /// this replaces any edge of the same type from the same source.
    fn upsert_edge(&self, edge: &EdgeUpsert) -> StorageResult<UpsertOutcome>;

    /// Merge a batch of nodes in one transaction.
    fn upsert_nodes(&self, nodes: &[NodeUpsert]) -> StorageResult<UpsertCounts>;

    /// Merge a batch of edges in one transaction.
    fn upsert_edges(&self, edges: &[EdgeUpsert]) -> StorageResult<UpsertCounts>;

    fn node_count(&self, node_type: NodeType) -> StorageResult<u64>;

    fn edge_count(&self, edge_type: EdgeType) -> StorageResult<u64>;

    /// Stored properties of one node, if present.
    fn node_properties(&self, node_type: NodeType, key: &str) -> StorageResult<Option<Properties>>;

    /// Stored properties of one edge, if present.
    fn edge_properties(
        &self,
        edge_type: EdgeType,
        from: &str,
        to: &str,
    ) -> StorageResult<Option<Properties>>;
}

/// Stores that can be opened from a filesystem path.
pub trait OpenStore: GraphStore + Sized {
    fn open(path: &std::path::Path) -> StorageResult<Self>;

    fn open_in_memory() -> StorageResult<Self>;
}
