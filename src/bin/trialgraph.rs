//! trialgraph CLI
//!
//! Thin operational wrapper over the library: run a snapshot batch into
//! a graph database, dry-run the transformation, or inspect a store.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use trialgraph::graph::{EdgeType, NodeType};
use trialgraph::load::DEFAULT_BATCH_SIZE;
use trialgraph::record::RecordBatch;
use trialgraph::storage::{GraphStore, OpenStore, SqliteStore};
use trialgraph::{Loader, Pipeline};

#[derive(Parser)]
#[command(name = "trialgraph", version = trialgraph::VERSION)]
#[command(about = "Load clinical-trial registry snapshots into a property graph")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Transform and load a snapshot batch
    Run {
        /// Path to the snapshot batch (JSON)
        batch: PathBuf,
        /// Path to the graph database
        #[arg(long)]
        db: Option<PathBuf>,
        /// Upserts per transaction
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },
    /// Transform a batch and print the change-set summary, without loading
    Transform {
        /// Path to the snapshot batch (JSON)
        batch: PathBuf,
    },
    /// Create the store schema and constraints
    Schema {
        /// Path to the graph database
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Print node and edge counts for a store
    Stats {
        /// Path to the graph database
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("trialgraph")
        .join("graph.db")
}

fn open_store(db: Option<PathBuf>) -> Result<Arc<SqliteStore>, Box<dyn std::error::Error>> {
    let path = db.unwrap_or_else(default_db_path);
    Ok(Arc::new(SqliteStore::open(&path)?))
}

fn read_batch(path: &PathBuf) -> Result<RecordBatch, Box<dyn std::error::Error>> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Run { batch, db, batch_size } => {
            let store = open_store(db)?;
            let pipeline = Pipeline::new(store).with_batch_size(batch_size);
            let summary = pipeline.run(&read_batch(&batch)?).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Transform { batch } => {
            let out = trialgraph::assemble(&read_batch(&batch)?);
            println!(
                "change-set: {} nodes, {} edges",
                out.change_set.node_count(),
                out.change_set.edge_count()
            );
            for node_type in NodeType::ALL {
                println!("  {:<14} {}", node_type, out.change_set.nodes_of(node_type).len());
            }
            for edge_type in EdgeType::ALL {
                println!("  {:<18} {}", edge_type, out.change_set.edges_of(edge_type).len());
            }
            println!("{}", serde_json::to_string_pretty(&out.quality)?);
        }
        Command::Schema { db } => {
            let store = open_store(db)?;
            Loader::new(store).ensure_schema()?;
            println!("schema ready");
        }
        Command::Stats { db } => {
            let store = open_store(db)?;
            for node_type in NodeType::ALL {
                println!("{:<14} {}", node_type, store.node_count(node_type)?);
            }
            for edge_type in EdgeType::ALL {
                println!("{:<18} {}", edge_type, store.edge_count(edge_type)?);
            }
        }
    }
    Ok(())
}
