//! End-to-end runs: batch in, run summary out
//!
//! Ties assembly and loading together. Per-record problems stay in the
//! quality report; only schema failures surface as errors, because a
//! store without constraints cannot merge safely.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use crate::assemble::{assemble, AssembleOutput};
use crate::load::Loader;
use crate::record::RecordBatch;
use crate::report::{RunStatus, RunSummary};
use crate::storage::{GraphStore, StorageResult};

/// The transformation-and-loading pipeline over one graph store.
pub struct Pipeline {
    loader: Loader,
}

impl Pipeline {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self {
            loader: Loader::new(store),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.loader = self.loader.with_batch_size(batch_size);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.loader = self.loader.with_max_retries(max_retries);
        self
    }

    pub fn with_base_backoff(mut self, base_backoff: Duration) -> Self {
        self.loader = self.loader.with_base_backoff(base_backoff);
        self
    }

    /// Transform a batch without touching the store.
    pub fn transform(&self, batch: &RecordBatch) -> AssembleOutput {
        assemble(batch)
    }

    /// Run one batch end to end.
    pub async fn run(&self, batch: &RecordBatch) -> StorageResult<RunSummary> {
        let run_id = Uuid::new_v4();
        info!(%run_id, studies = batch.studies.len(), "run started");

        self.loader.ensure_schema()?;

        let AssembleOutput { change_set, quality } = assemble(batch);
        for nct_id in &quality.rejected_trials {
            warn!(%run_id, nct_id, "trial rejected by validation");
        }

        let load = self.loader.apply(&change_set).await;
        let wrote_anything = load.nodes_written() + load.edges_written() > 0;
        let status = RunSummary::status_of(&load, wrote_anything);
        match status {
            RunStatus::Succeeded => info!(
                %run_id,
                nodes = load.nodes_written(),
                edges = load.edges_written(),
                anomalies = quality.anomaly_count(),
                "run succeeded"
            ),
            RunStatus::PartiallyApplied => warn!(
                %run_id,
                failed_batches = load.failed_batches.len(),
                skipped_edge_types = load.skipped_edge_types.len(),
                "run partially applied"
            ),
            RunStatus::Failed => warn!(%run_id, "run failed, nothing applied"),
        }

        Ok(RunSummary {
            run_id,
            snapshot_at: batch.snapshot_at,
            status,
            quality,
            load,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeType, EdgeUpsert, NodeType, NodeUpsert, Properties};
    use crate::record::{SponsorRecord, SponsorRole, StudyRecord};
    use crate::report::UpsertCounts;
    use crate::storage::{OpenStore, SqliteStore, StorageError, UpsertOutcome};

    /// Delegates to an in-memory store but refuses to create constraints.
    struct BrokenSchemaStore {
        inner: SqliteStore,
    }

    impl BrokenSchemaStore {
        fn new() -> Self {
            Self {
                inner: SqliteStore::open_in_memory().unwrap(),
            }
        }
    }

    impl GraphStore for BrokenSchemaStore {
        fn ensure_constraint(&self, _node_type: NodeType) -> StorageResult<()> {
            Err(StorageError::Schema("conflicting index definition".to_string()))
        }

        fn upsert_node(&self, node: &NodeUpsert) -> StorageResult<UpsertOutcome> {
            self.inner.upsert_node(node)
        }

        fn upsert_edge(&self, edge: &EdgeUpsert) -> StorageResult<UpsertOutcome> {
            self.inner.upsert_edge(edge)
        }

        fn upsert_nodes(&self, nodes: &[NodeUpsert]) -> StorageResult<UpsertCounts> {
            self.inner.upsert_nodes(nodes)
        }

        fn upsert_edges(&self, edges: &[EdgeUpsert]) -> StorageResult<UpsertCounts> {
            self.inner.upsert_edges(edges)
        }

        fn node_count(&self, node_type: NodeType) -> StorageResult<u64> {
            self.inner.node_count(node_type)
        }

        fn edge_count(&self, edge_type: EdgeType) -> StorageResult<u64> {
            self.inner.edge_count(edge_type)
        }

        fn node_properties(
            &self,
            node_type: NodeType,
            key: &str,
        ) -> StorageResult<Option<Properties>> {
            self.inner.node_properties(node_type, key)
        }

        fn edge_properties(
            &self,
            edge_type: EdgeType,
            from: &str,
            to: &str,
        ) -> StorageResult<Option<Properties>> {
            self.inner.edge_properties(edge_type, from, to)
        }
    }

    fn batch_with_one_trial() -> RecordBatch {
        let mut batch = RecordBatch::empty();
        batch.studies.push(StudyRecord {
            nct_id: "NCT00000001".to_string(),
            brief_title: Some("A Study".to_string()),
            phase: Some("PHASE3".to_string()),
            overall_status: Some("COMPLETED".to_string()),
            enrollment: Some(250),
            number_of_arms: None,
            is_fda_regulated_drug: None,
        });
        batch.sponsors.push(SponsorRecord {
            nct_id: "NCT00000001".to_string(),
            name: Some("Novartis".to_string()),
            agency_class: Some("INDUSTRY".to_string()),
            role: SponsorRole::Lead,
        });
        batch
    }

    #[tokio::test]
    async fn a_clean_run_succeeds() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let pipeline = Pipeline::new(store.clone());

        let summary = pipeline.run(&batch_with_one_trial()).await.unwrap();
        assert_eq!(summary.status, RunStatus::Succeeded);
        assert_eq!(summary.quality.trials_in, 1);
        assert_eq!(summary.quality.trials_rejected, 0);
        assert_eq!(store.node_count(NodeType::Trial).unwrap(), 1);
        assert_eq!(store.node_count(NodeType::Organization).unwrap(), 1);
        assert_eq!(store.edge_count(EdgeType::SponsoredBy).unwrap(), 1);
    }

    #[tokio::test]
    async fn a_schema_failure_aborts_before_any_write() {
        let store = Arc::new(BrokenSchemaStore::new());
        let pipeline = Pipeline::new(store.clone());

        let err = pipeline.run(&batch_with_one_trial()).await.unwrap_err();
        assert!(matches!(err, StorageError::Schema(_)));
        for node_type in NodeType::ALL {
            assert_eq!(store.inner.node_count(node_type).unwrap(), 0);
        }
        for edge_type in EdgeType::ALL {
            assert_eq!(store.inner.edge_count(edge_type).unwrap(), 0);
        }
    }

    #[tokio::test]
    async fn transform_is_side_effect_free() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let pipeline = Pipeline::new(store.clone());

        let out = pipeline.transform(&batch_with_one_trial());
        assert_eq!(out.change_set.node_count(), 2);
        assert_eq!(store.node_count(NodeType::Trial).unwrap(), 0);
    }
}
