//! Run reporting: the sole surface for all error classes
//!
//! Per-record validation failures and data-quality anomalies are
//! counted, never thrown. A run terminates normally with non-zero
//! counts; only schema errors abort. The orchestration layer reads the
//! run summary and nothing else.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::graph::{EdgeType, NodeType};

/// Data-quality counters accumulated during transformation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QualityReport {
    /// Studies seen in the batch.
    pub trials_in: usize,
    /// Studies rejected by validation (missing identifier, multiple
    /// lead sponsors). Rejected trials contribute nothing to the
    /// change-set.
    pub trials_rejected: usize,
    /// Entity occurrences with empty/unusable names, resolved to the
    /// sentinel unknown entity.
    pub unresolved_names: usize,
    /// Conflicting non-absent edge attribute values; first-seen won.
    pub attribute_conflicts: usize,
    /// Duplicate relationship facts collapsed into one upsert.
    pub duplicate_facts: usize,
    /// Link rows referencing a study absent from (or rejected in) the
    /// batch.
    pub orphan_links: usize,
    /// Interventions skipped because their type is out of scope.
    pub interventions_skipped: usize,
    /// In-scope interventions seen / with an extracted route / form.
    pub interventions_in: usize,
    pub routes_extracted: usize,
    pub dosage_forms_extracted: usize,
    /// Identifiers of rejected trials, for the orchestrator's logs.
    pub rejected_trials: Vec<String>,
}

impl QualityReport {
    /// Total anomaly count across all non-fatal classes.
    pub fn anomaly_count(&self) -> usize {
        self.unresolved_names
            + self.attribute_conflicts
            + self.duplicate_facts
            + self.orphan_links
    }

    /// Fraction of in-scope interventions with an extracted route.
    pub fn route_coverage(&self) -> f64 {
        coverage(self.routes_extracted, self.interventions_in)
    }

    pub fn dosage_form_coverage(&self) -> f64 {
        coverage(self.dosage_forms_extracted, self.interventions_in)
    }
}

fn coverage(hits: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

/// Created/updated tallies for one node or edge type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertCounts {
    pub created: usize,
    pub updated: usize,
}

impl UpsertCounts {
    pub fn total(&self) -> usize {
        self.created + self.updated
    }

    pub fn absorb(&mut self, other: UpsertCounts) {
        self.created += other.created;
        self.updated += other.updated;
    }
}

/// A batch that exhausted its retries (or failed hard).
#[derive(Debug, Clone, Serialize)]
pub struct FailedBatch {
    /// Node or edge type label the batch belonged to.
    pub kind: String,
    /// Zero-based batch index within that type.
    pub index: usize,
    /// Number of upserts in the batch.
    pub size: usize,
    /// Final error, rendered.
    pub error: String,
}

/// Outcome of applying one change-set to the store.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub nodes: BTreeMap<NodeType, UpsertCounts>,
    pub edges: BTreeMap<EdgeType, UpsertCounts>,
    pub failed_batches: Vec<FailedBatch>,
    /// Edge types skipped because an endpoint node type had failures.
    pub skipped_edge_types: Vec<EdgeType>,
}

impl LoadReport {
    pub fn nodes_written(&self) -> usize {
        self.nodes.values().map(UpsertCounts::total).sum()
    }

    pub fn edges_written(&self) -> usize {
        self.edges.values().map(UpsertCounts::total).sum()
    }

    pub fn is_fully_applied(&self) -> bool {
        self.failed_batches.is_empty() && self.skipped_edge_types.is_empty()
    }
}

/// Final status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    PartiallyApplied,
    Failed,
}

/// The structured summary handed back to the orchestration layer.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub snapshot_at: DateTime<Utc>,
    pub status: RunStatus,
    pub quality: QualityReport,
    pub load: LoadReport,
}

impl RunSummary {
    pub fn status_of(load: &LoadReport, wrote_anything: bool) -> RunStatus {
        if load.is_fully_applied() {
            RunStatus::Succeeded
        } else if wrote_anything {
            RunStatus::PartiallyApplied
        } else {
            RunStatus::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anomalies_aggregate_across_classes() {
        let quality = QualityReport {
            unresolved_names: 2,
            attribute_conflicts: 1,
            duplicate_facts: 3,
            orphan_links: 1,
            ..Default::default()
        };
        assert_eq!(quality.anomaly_count(), 7);
    }

    #[test]
    fn coverage_handles_empty_batches() {
        let quality = QualityReport::default();
        assert_eq!(quality.route_coverage(), 0.0);

        let quality = QualityReport {
            interventions_in: 4,
            routes_extracted: 3,
            ..Default::default()
        };
        assert!((quality.route_coverage() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn status_reflects_partial_application() {
        let clean = LoadReport::default();
        assert_eq!(RunSummary::status_of(&clean, true), RunStatus::Succeeded);

        let mut partial = LoadReport::default();
        partial.failed_batches.push(FailedBatch {
            kind: "Drug".to_string(),
            index: 0,
            size: 10,
            error: "store unavailable".to_string(),
        });
        assert_eq!(RunSummary::status_of(&partial, true), RunStatus::PartiallyApplied);
        assert_eq!(RunSummary::status_of(&partial, false), RunStatus::Failed);
    }
}
