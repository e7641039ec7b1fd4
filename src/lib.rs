//! trialgraph: clinical-trial registry snapshots to a property graph
//!
//! The core of a trial knowledge-graph pipeline. Denormalized registry
//! rows come in as snapshot batches; entity resolution, attribute
//! extraction, and graph assembly turn them into a change-set of keyed
//! node and edge upserts; the loader applies the change-set to a store
//! idempotently, so re-running a snapshot converges instead of
//! duplicating.
//!
//! The pieces compose through [`pipeline::Pipeline`]:
//!
//! - [`record`]: the snapshot batch schema and controlled vocabularies
//! - [`normalize`]: deterministic name normalization and dedup keys
//! - [`extract`]: route and dosage-form extraction from free text
//! - [`resolve`]: consolidation of raw mentions into canonical entities
//! - [`assemble`]: batch to change-set, with data-quality accounting
//! - [`graph`]: the change-set model and its merge reducers
//! - [`load`]: batched, retrying, idempotent application to a store
//! - [`storage`]: the `GraphStore` trait and the SQLite backend

pub mod assemble;
pub mod extract;
pub mod graph;
pub mod load;
pub mod normalize;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod resolve;
pub mod storage;

pub use assemble::{assemble, AssembleOutput};
pub use graph::{ChangeSet, EdgeType, EdgeUpsert, NodeType, NodeUpsert};
pub use load::{Loader, DEFAULT_BATCH_SIZE};
pub use pipeline::Pipeline;
pub use record::RecordBatch;
pub use report::{LoadReport, QualityReport, RunStatus, RunSummary};
pub use storage::{GraphStore, OpenStore, SqliteStore, StorageError, StorageResult};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
