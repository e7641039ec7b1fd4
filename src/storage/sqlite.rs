//! SQLite-backed graph store
//!
//! Nodes and edges live in two tables keyed by their merge identities,
//! with properties as a JSON document per row. Merging happens in Rust:
//! read the existing document, fold the incoming one in with the
//! change-set reducers, write back. That keeps the name-quality guard
//! and the absent-never-erases rule in one place instead of splitting
//! them between Rust and SQL.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use crate::graph::{
    merge_edge_properties, merge_node_properties, EdgeType, EdgeUpsert, NodeType, NodeUpsert,
    Properties,
};
use crate::report::UpsertCounts;
use crate::storage::traits::{
    GraphStore, OpenStore, StorageError, StorageResult, UpsertOutcome,
};

/// Graph store on a single SQLite database.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    fn from_connection(conn: Connection) -> StorageResult<Self> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS nodes (
                node_type   TEXT NOT NULL,
                key         TEXT NOT NULL,
                properties  TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                PRIMARY KEY (node_type, key)
            );

            CREATE TABLE IF NOT EXISTS edges (
                edge_type   TEXT NOT NULL,
                from_key    TEXT NOT NULL,
                to_key      TEXT NOT NULL,
                properties  TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                PRIMARY KEY (edge_type, from_key, to_key)
            );

            CREATE INDEX IF NOT EXISTS idx_edges_from ON edges(edge_type, from_key);
            CREATE INDEX IF NOT EXISTS idx_edges_to ON edges(edge_type, to_key);
            "#,
        )
        .map_err(|e| StorageError::Schema(e.to_string()))?;
        Ok(())
    }

    fn lock(&self) -> StorageResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Unavailable("connection lock poisoned".to_string()))
    }

    fn upsert_node_on(conn: &Connection, node: &NodeUpsert) -> StorageResult<UpsertOutcome> {
        let existing: Option<String> = conn
            .query_row(
                "SELECT properties FROM nodes WHERE node_type = ?1 AND key = ?2",
                (node.node_type.label(), node.key.as_str()),
                |row| row.get(0),
            )
            .optional()?;
        let now = Utc::now().to_rfc3339();
        match existing {
            Some(json) => {
                let mut properties: Properties = serde_json::from_str(&json)?;
                merge_node_properties(&mut properties, &node.properties);
                conn.execute(
                    "UPDATE nodes SET properties = ?3, updated_at = ?4
                     WHERE node_type = ?1 AND key = ?2",
                    (
                        node.node_type.label(),
                        node.key.as_str(),
                        serde_json::to_string(&properties)?,
                        now,
                    ),
                )?;
                Ok(UpsertOutcome::Updated)
            }
            None => {
                conn.execute(
                    "INSERT INTO nodes (node_type, key, properties, updated_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    (
                        node.node_type.label(),
                        node.key.as_str(),
                        serde_json::to_string(&node.properties)?,
                        now,
                    ),
                )?;
                Ok(UpsertOutcome::Created)
            }
        }
    }

    fn upsert_edge_on(conn: &Connection, edge: &EdgeUpsert) -> StorageResult<UpsertOutcome> {
        if edge.edge_type.single_target() {
            // Cardinality one per source: a new target replaces the
            // previous edge rather than accumulating alongside it.
            conn.execute(
                "DELETE FROM edges
                 WHERE edge_type = ?1 AND from_key = ?2 AND to_key <> ?3",
                (
                    edge.edge_type.label(),
                    edge.from.as_str(),
                    edge.to.as_str(),
                ),
            )?;
        }
        let existing: Option<String> = conn
            .query_row(
                "SELECT properties FROM edges
                 WHERE edge_type = ?1 AND from_key = ?2 AND to_key = ?3",
                (
                    edge.edge_type.label(),
                    edge.from.as_str(),
                    edge.to.as_str(),
                ),
                |row| row.get(0),
            )
            .optional()?;
        let now = Utc::now().to_rfc3339();
        match existing {
            Some(json) => {
                let mut properties: Properties = serde_json::from_str(&json)?;
                merge_edge_properties(&mut properties, &edge.properties);
                conn.execute(
                    "UPDATE edges SET properties = ?4, updated_at = ?5
                     WHERE edge_type = ?1 AND from_key = ?2 AND to_key = ?3",
                    (
                        edge.edge_type.label(),
                        edge.from.as_str(),
                        edge.to.as_str(),
                        serde_json::to_string(&properties)?,
                        now,
                    ),
                )?;
                Ok(UpsertOutcome::Updated)
            }
            None => {
                conn.execute(
                    "INSERT INTO edges (edge_type, from_key, to_key, properties, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    (
                        edge.edge_type.label(),
                        edge.from.as_str(),
                        edge.to.as_str(),
                        serde_json::to_string(&edge.properties)?,
                        now,
                    ),
                )?;
                Ok(UpsertOutcome::Created)
            }
        }
    }
}

impl GraphStore for SqliteStore {
    fn ensure_constraint(&self, node_type: NodeType) -> StorageResult<()> {
        let conn = self.lock()?;
        // The primary key already enforces (node_type, key) uniqueness;
        // the per-type indexes serve lookups on commonly queried fields.
        let statements: &[String] = &match node_type {
            NodeType::Trial => [
                "CREATE INDEX IF NOT EXISTS idx_trial_phase ON nodes(json_extract(properties, '$.phase')) WHERE node_type = 'Trial'".to_string(),
                "CREATE INDEX IF NOT EXISTS idx_trial_status ON nodes(json_extract(properties, '$.status_category')) WHERE node_type = 'Trial'".to_string(),
            ],
            other => [
                format!(
                    "CREATE INDEX IF NOT EXISTS idx_{}_name ON nodes(json_extract(properties, '$.name')) WHERE node_type = '{}'",
                    other.label().to_lowercase(),
                    other.label()
                ),
                format!(
                    "CREATE INDEX IF NOT EXISTS idx_{}_key ON nodes(key) WHERE node_type = '{}'",
                    other.label().to_lowercase(),
                    other.label()
                ),
            ],
        };
        for sql in statements {
            conn.execute_batch(sql)
                .map_err(|e| StorageError::Schema(e.to_string()))?;
        }
        debug!(node_type = %node_type, "constraints ensured");
        Ok(())
    }

    fn upsert_node(&self, node: &NodeUpsert) -> StorageResult<UpsertOutcome> {
        let conn = self.lock()?;
        Self::upsert_node_on(&conn, node)
    }

    fn upsert_edge(&self, edge: &EdgeUpsert) -> StorageResult<UpsertOutcome> {
        let conn = self.lock()?;
        Self::upsert_edge_on(&conn, edge)
    }

    fn upsert_nodes(&self, nodes: &[NodeUpsert]) -> StorageResult<UpsertCounts> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let mut counts = UpsertCounts::default();
        for node in nodes {
            match Self::upsert_node_on(&tx, node)? {
                UpsertOutcome::Created => counts.created += 1,
                UpsertOutcome::Updated => counts.updated += 1,
            }
        }
        tx.commit()?;
        Ok(counts)
    }

    fn upsert_edges(&self, edges: &[EdgeUpsert]) -> StorageResult<UpsertCounts> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let mut counts = UpsertCounts::default();
        for edge in edges {
            match Self::upsert_edge_on(&tx, edge)? {
                UpsertOutcome::Created => counts.created += 1,
                UpsertOutcome::Updated => counts.updated += 1,
            }
        }
        tx.commit()?;
        Ok(counts)
    }

    fn node_count(&self, node_type: NodeType) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM nodes WHERE node_type = ?1",
            [node_type.label()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn edge_count(&self, edge_type: EdgeType) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM edges WHERE edge_type = ?1",
            [edge_type.label()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn node_properties(&self, node_type: NodeType, key: &str) -> StorageResult<Option<Properties>> {
        let conn = self.lock()?;
        let json: Option<String> = conn
            .query_row(
                "SELECT properties FROM nodes WHERE node_type = ?1 AND key = ?2",
                (node_type.label(), key),
                |row| row.get(0),
            )
            .optional()?;
        json.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(StorageError::from)
    }

    fn edge_properties(
        &self,
        edge_type: EdgeType,
        from: &str,
        to: &str,
    ) -> StorageResult<Option<Properties>> {
        let conn = self.lock()?;
        let json: Option<String> = conn
            .query_row(
                "SELECT properties FROM edges
                 WHERE edge_type = ?1 AND from_key = ?2 AND to_key = ?3",
                (edge_type.label(), from, to),
                |row| row.get(0),
            )
            .optional()?;
        json.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(StorageError::from)
    }
}

impl OpenStore for SqliteStore {
    fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    fn open_in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::PropertyValue;

    fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        for node_type in NodeType::ALL {
            store.ensure_constraint(node_type).unwrap();
        }
        store
    }

    fn node_properties(store: &SqliteStore, node_type: NodeType, key: &str) -> Properties {
        store.node_properties(node_type, key).unwrap().unwrap()
    }

    #[test]
    fn upsert_creates_then_updates() {
        let store = store();
        let node = NodeUpsert::new(NodeType::Drug, "aspirin").with_property("name", "Aspirin");
        assert_eq!(store.upsert_node(&node).unwrap(), UpsertOutcome::Created);
        assert_eq!(store.upsert_node(&node).unwrap(), UpsertOutcome::Updated);
        assert_eq!(store.node_count(NodeType::Drug).unwrap(), 1);
    }

    #[test]
    fn reapplying_a_batch_changes_nothing() {
        let store = store();
        let nodes = vec![
            NodeUpsert::new(NodeType::Trial, "NCT1").with_property("phase", "PHASE2"),
            NodeUpsert::new(NodeType::Trial, "NCT2").with_property("phase", "PHASE3"),
        ];
        let first = store.upsert_nodes(&nodes).unwrap();
        assert_eq!(first.created, 2);
        let second = store.upsert_nodes(&nodes).unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.updated, 2);
        assert_eq!(store.node_count(NodeType::Trial).unwrap(), 2);
        let props = node_properties(&store, NodeType::Trial, "NCT1");
        assert_eq!(props.get("phase"), Some(&"PHASE2".into()));
    }

    #[test]
    fn merge_preserves_fields_absent_from_the_incoming_upsert() {
        let store = store();
        store
            .upsert_node(
                &NodeUpsert::new(NodeType::Trial, "NCT1")
                    .with_property("brief_title", "A Study")
                    .with_property("enrollment", 100),
            )
            .unwrap();
        store
            .upsert_node(&NodeUpsert::new(NodeType::Trial, "NCT1").with_property("enrollment", 150))
            .unwrap();
        let props = node_properties(&store, NodeType::Trial, "NCT1");
        assert_eq!(props.get("brief_title"), Some(&"A Study".into()));
        assert_eq!(props.get("enrollment"), Some(&PropertyValue::Int(150)));
    }

    #[test]
    fn stored_display_names_never_regress() {
        let store = store();
        store
            .upsert_node(
                &NodeUpsert::new(NodeType::Organization, "pfizer").with_property("name", "Pfizer"),
            )
            .unwrap();
        store
            .upsert_node(
                &NodeUpsert::new(NodeType::Organization, "pfizer").with_property("name", "PFIZER"),
            )
            .unwrap();
        let props = node_properties(&store, NodeType::Organization, "pfizer");
        assert_eq!(props.get("name"), Some(&"Pfizer".into()));
    }

    #[test]
    fn single_target_edges_replace_instead_of_accumulate() {
        let store = store();
        store
            .upsert_edge(&EdgeUpsert::new(EdgeType::SponsoredBy, "NCT1", "pfizer"))
            .unwrap();
        store
            .upsert_edge(&EdgeUpsert::new(EdgeType::SponsoredBy, "NCT1", "bayer"))
            .unwrap();
        assert_eq!(store.edge_count(EdgeType::SponsoredBy).unwrap(), 1);

        // Multi-target types accumulate as usual.
        store
            .upsert_edge(&EdgeUpsert::new(EdgeType::CollaboratesWith, "NCT1", "pfizer"))
            .unwrap();
        store
            .upsert_edge(&EdgeUpsert::new(EdgeType::CollaboratesWith, "NCT1", "bayer"))
            .unwrap();
        assert_eq!(store.edge_count(EdgeType::CollaboratesWith).unwrap(), 2);
    }

    #[test]
    fn edge_merge_unions_attributes() {
        let store = store();
        store
            .upsert_edge(
                &EdgeUpsert::new(EdgeType::Investigates, "NCT1", "aspirin")
                    .with_optional("route", Some("ORAL")),
            )
            .unwrap();
        store
            .upsert_edge(
                &EdgeUpsert::new(EdgeType::Investigates, "NCT1", "aspirin")
                    .with_optional("dosage_form", Some("TABLET")),
            )
            .unwrap();

        let props = store
            .edge_properties(EdgeType::Investigates, "NCT1", "aspirin")
            .unwrap()
            .unwrap();
        assert_eq!(props.get("route"), Some(&"ORAL".into()));
        assert_eq!(props.get("dosage_form"), Some(&"TABLET".into()));
    }

    #[test]
    fn constraints_are_idempotent() {
        let store = store();
        for node_type in NodeType::ALL {
            store.ensure_constraint(node_type).unwrap();
        }
    }

    #[test]
    fn opens_on_disk_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .upsert_node(&NodeUpsert::new(NodeType::Trial, "NCT1"))
                .unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.node_count(NodeType::Trial).unwrap(), 1);
    }
}
