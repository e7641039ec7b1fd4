//! Idempotent change-set loading
//!
//! Applies a change-set to a graph store in fixed-size batches: all
//! node types first, in parallel, then edge types whose endpoint node
//! types loaded cleanly. Transient store failures retry with bounded
//! exponential backoff; a batch that exhausts its retries is recorded
//! and the run continues, so the report always says exactly what landed.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::graph::{ChangeSet, EdgeType, EdgeUpsert, NodeType, NodeUpsert};
use crate::report::{FailedBatch, LoadReport, UpsertCounts};
use crate::storage::{GraphStore, StorageError, StorageResult};

/// Upserts per transaction.
pub const DEFAULT_BATCH_SIZE: usize = 500;

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_BASE_BACKOFF: Duration = Duration::from_millis(200);

/// One retryable unit of work: a batch of same-type upserts.
#[derive(Clone)]
enum Batch {
    Nodes(Vec<NodeUpsert>),
    Edges(Vec<EdgeUpsert>),
}

impl Batch {
    fn len(&self) -> usize {
        match self {
            Self::Nodes(items) => items.len(),
            Self::Edges(items) => items.len(),
        }
    }
}

/// Applies change-sets to a store.
pub struct Loader {
    store: Arc<dyn GraphStore>,
    batch_size: usize,
    max_retries: u32,
    base_backoff: Duration,
}

impl Loader {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self {
            store,
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            base_backoff: DEFAULT_BASE_BACKOFF,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_backoff(mut self, base_backoff: Duration) -> Self {
        self.base_backoff = base_backoff;
        self
    }

    /// Ensure constraints for every node type. A failure here is fatal:
    /// without uniqueness constraints, merges are not well-defined.
    pub fn ensure_schema(&self) -> StorageResult<()> {
        for node_type in NodeType::ALL {
            self.store.ensure_constraint(node_type)?;
        }
        Ok(())
    }

    /// Apply one change-set. Never fails outright; the report carries
    /// per-type tallies plus whatever could not be applied.
    pub async fn apply(&self, change_set: &ChangeSet) -> LoadReport {
        let mut report = LoadReport::default();

        // Node phase: all four types in parallel. Batches within a type
        // run sequentially so created/updated tallies stay meaningful.
        let mut tasks: JoinSet<(NodeType, UpsertCounts, Vec<FailedBatch>)> = JoinSet::new();
        for node_type in NodeType::ALL {
            let nodes = change_set.nodes_of(node_type);
            if nodes.is_empty() {
                continue;
            }
            let batches: Vec<Batch> = nodes
                .chunks(self.batch_size)
                .map(|chunk| Batch::Nodes(chunk.to_vec()))
                .collect();
            let store = Arc::clone(&self.store);
            let (max_retries, base_backoff) = (self.max_retries, self.base_backoff);
            tasks.spawn(async move {
                let (counts, failed) =
                    apply_batches(store, node_type.label(), batches, max_retries, base_backoff)
                        .await;
                (node_type, counts, failed)
            });
        }
        let mut dirty_node_types: Vec<NodeType> = Vec::new();
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok((node_type, counts, failed)) => {
                    if !failed.is_empty() {
                        dirty_node_types.push(node_type);
                    }
                    report.nodes.entry(node_type).or_default().absorb(counts);
                    report.failed_batches.extend(failed);
                }
                Err(err) => {
                    // The task's node type is lost with the panic, so
                    // every node type counts as incomplete and no edge
                    // phase runs against possibly missing endpoints.
                    warn!(error = %err, "node load task panicked");
                    for node_type in NodeType::ALL {
                        if !dirty_node_types.contains(&node_type) {
                            dirty_node_types.push(node_type);
                        }
                    }
                }
            }
        }

        // Edge phase: only edge types whose endpoints loaded cleanly.
        let mut tasks: JoinSet<(EdgeType, UpsertCounts, Vec<FailedBatch>)> = JoinSet::new();
        for edge_type in EdgeType::ALL {
            let edges = change_set.edges_of(edge_type);
            if edges.is_empty() {
                continue;
            }
            let (from, to) = edge_type.endpoints();
            if dirty_node_types.contains(&from) || dirty_node_types.contains(&to) {
                warn!(edge_type = %edge_type, "skipping edge type, endpoint nodes incomplete");
                report.skipped_edge_types.push(edge_type);
                continue;
            }
            let batches: Vec<Batch> = edges
                .chunks(self.batch_size)
                .map(|chunk| Batch::Edges(chunk.to_vec()))
                .collect();
            let store = Arc::clone(&self.store);
            let (max_retries, base_backoff) = (self.max_retries, self.base_backoff);
            tasks.spawn(async move {
                let (counts, failed) =
                    apply_batches(store, edge_type.label(), batches, max_retries, base_backoff)
                        .await;
                (edge_type, counts, failed)
            });
        }
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok((edge_type, counts, failed)) => {
                    report.edges.entry(edge_type).or_default().absorb(counts);
                    report.failed_batches.extend(failed);
                }
                Err(err) => {
                    warn!(error = %err, "edge load task panicked");
                }
            }
        }

        info!(
            nodes = report.nodes_written(),
            edges = report.edges_written(),
            failed_batches = report.failed_batches.len(),
            "change-set applied"
        );
        report
    }
}

/// Apply one type's batches in order, retrying each batch independently.
async fn apply_batches(
    store: Arc<dyn GraphStore>,
    kind: &'static str,
    batches: Vec<Batch>,
    max_retries: u32,
    base_backoff: Duration,
) -> (UpsertCounts, Vec<FailedBatch>) {
    let mut counts = UpsertCounts::default();
    let mut failed = Vec::new();
    for (index, batch) in batches.into_iter().enumerate() {
        let size = batch.len();
        match apply_with_retries(&store, batch, max_retries, base_backoff).await {
            Ok(batch_counts) => counts.absorb(batch_counts),
            Err(err) => {
                warn!(kind, index, size, error = %err, "batch failed after retries");
                failed.push(FailedBatch {
                    kind: kind.to_string(),
                    index,
                    size,
                    error: err.to_string(),
                });
            }
        }
    }
    (counts, failed)
}

async fn apply_with_retries(
    store: &Arc<dyn GraphStore>,
    batch: Batch,
    max_retries: u32,
    base_backoff: Duration,
) -> StorageResult<UpsertCounts> {
    let mut attempt = 0;
    loop {
        let store = Arc::clone(store);
        let work = batch.clone();
        let result = tokio::task::spawn_blocking(move || match work {
            Batch::Nodes(nodes) => store.upsert_nodes(&nodes),
            Batch::Edges(edges) => store.upsert_edges(&edges),
        })
        .await
        .map_err(|err| StorageError::Unavailable(err.to_string()))?;
        match result {
            Ok(counts) => return Ok(counts),
            Err(err) if err.is_transient() && attempt < max_retries => {
                let delay = base_backoff * 2u32.pow(attempt);
                warn!(attempt, error = %err, "transient store failure, backing off");
                sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
