//! Graph store (§4.1): nodes, edges, adjacency, typed lookup, deletion
//! cascades.
//!
//! Backed by a single `rusqlite::Connection` behind a `Mutex`, following
//! the teacher crate's `Storage` pattern of a guarded connection shared
//! across layers rather than one handle per store (§9 "Cyclic ownership").

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::GraphStoreError;
use crate::model::{Edge, Node, NodeType};

type Result<T> = std::result::Result<T, GraphStoreError>;

/// Pack an `f32` embedding into a little-endian byte blob (§3).
pub fn pack_embedding(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Unpack a little-endian byte blob into an `f32` embedding. Malformed
/// blobs (length not a multiple of 4) yield `None` rather than panicking.
pub fn unpack_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}

/// Apply the performance/correctness PRAGMAs the teacher's
/// `configure_connection` uses, generalised (no encryption branch — out of
/// scope for this spec).
fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )?;
    Ok(())
}

fn row_to_node(row: &rusqlite::Row) -> rusqlite::Result<Node> {
    let node_type_str: String = row.get("node_type")?;
    let (node_type, _) = NodeType::parse_name(&node_type_str);
    let embedding_blob: Option<Vec<u8>> = row.get("embedding")?;
    let metadata_str: String = row.get("metadata")?;
    let created_at_str: String = row.get("created_at")?;
    let last_accessed_str: Option<String> = row.get("last_accessed_at")?;

    Ok(Node {
        id: row.get("id")?,
        name: row.get("name")?,
        node_type,
        description: row.get("description")?,
        embedding: embedding_blob.and_then(|b| unpack_embedding(&b)),
        created_at: created_at_str
            .parse::<DateTime<Utc>>()
            .unwrap_or_else(|_| Utc::now()),
        last_accessed_at: last_accessed_str.and_then(|s| s.parse::<DateTime<Utc>>().ok()),
        access_count: row.get("access_count")?,
        metadata: serde_json::from_str(&metadata_str).unwrap_or(serde_json::Value::Null),
    })
}

fn row_to_edge(row: &rusqlite::Row) -> rusqlite::Result<Edge> {
    let created_at_str: String = row.get("created_at")?;
    Ok(Edge {
        id: row.get("id")?,
        source_node_id: row.get("source_node_id")?,
        target_node_id: row.get("target_node_id")?,
        relation: row.get("relation")?,
        weight: row.get("weight")?,
        created_at: created_at_str
            .parse::<DateTime<Utc>>()
            .unwrap_or_else(|_| Utc::now()),
    })
}

/// The graph store (§4.1).
pub struct GraphStore {
    conn: Mutex<Option<Connection>>,
}

impl GraphStore {
    /// Open (or create) the graph store at `path`. `None` opens an
    /// ephemeral in-memory database (§6.4).
    pub fn open(path: Option<&std::path::Path>) -> Result<Self> {
        let conn = match path {
            Some(p) => Connection::open(p)?,
            None => Connection::open_in_memory()?,
        };
        configure_connection(&conn)?;
        crate::schema::apply_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self.conn.lock().expect("graph store mutex poisoned");
        let conn = guard.as_ref().ok_or(GraphStoreError::Closed)?;
        f(conn)
    }

    /// Lend the underlying connection for use by the memory store, which
    /// must share this exact handle (§9, §4.3) rather than opening its own.
    pub fn with_shared_connection<T, E>(
        &self,
        f: impl FnOnce(&Connection) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E>
    where
        E: From<GraphStoreError>,
    {
        let guard = self.conn.lock().expect("graph store mutex poisoned");
        let conn = guard.as_ref().ok_or(GraphStoreError::Closed)?;
        f(conn)
    }

    /// Run `f` inside a single SQL transaction against the shared connection,
    /// committing on `Ok` and rolling back (via `Transaction`'s `Drop`) on
    /// `Err` (§4.4 step 3, §4.6 step 5, §7). `f` receives the live
    /// transaction's `Connection` handle, so it can call the `_stmt` helpers
    /// below or `MemoryStore`'s equivalents directly — never the public
    /// auto-committing wrappers, which would each open their own implicit
    /// transaction.
    pub fn with_transaction<T, E>(
        &self,
        f: impl FnOnce(&Connection) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E>
    where
        E: From<GraphStoreError>,
    {
        self.with_shared_connection(|conn| {
            let tx = conn.unchecked_transaction().map_err(GraphStoreError::from)?;
            let result = f(&tx)?;
            tx.commit().map_err(GraphStoreError::from)?;
            Ok(result)
        })
    }

    /// Upsert by id (§4.1).
    pub fn add_node(&self, node: &Node) -> Result<()> {
        self.with_conn(|conn| Self::add_node_stmt(conn, node))
    }

    /// Inner form of [`Self::add_node`] taking a live `&Connection` so
    /// callers composing a multi-statement transaction (ingestion Phase 3,
    /// §4.4) can run it without re-acquiring the connection mutex.
    pub(crate) fn add_node_stmt(conn: &Connection, node: &Node) -> Result<()> {
        let embedding_blob = node.embedding.as_deref().map(pack_embedding);
        let metadata_str = serde_json::to_string(&node.metadata)
            .map_err(|e| GraphStoreError::InvalidNode(e.to_string()))?;
        conn.execute(
            "INSERT INTO nodes (id, name, node_type, description, embedding, created_at, last_accessed_at, access_count, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                node_type = excluded.node_type,
                description = excluded.description,
                embedding = excluded.embedding,
                metadata = excluded.metadata",
            params![
                node.id,
                node.name,
                node.node_type.as_str(),
                node.description,
                embedding_blob,
                node.created_at.to_rfc3339(),
                node.last_accessed_at.map(|t| t.to_rfc3339()),
                node.access_count,
                metadata_str,
            ],
        )?;
        Ok(())
    }

    /// `GetNode` → node or `None` (not-found is not an error) (§4.1).
    pub fn get_node(&self, id: &str) -> Result<Option<Node>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, node_type, description, embedding, created_at, last_accessed_at, access_count, metadata
                 FROM nodes WHERE id = ?1",
                params![id],
                row_to_node,
            )
            .optional()
            .map_err(GraphStoreError::from)
        })
    }

    /// Case-insensitive, whitespace-normalised name lookup, ordered
    /// deterministically by created_at then id (§4.1).
    pub fn find_nodes_by_name(&self, name: &str) -> Result<Vec<Node>> {
        let normalized = crate::ids::normalize_name(name);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, node_type, description, embedding, created_at, last_accessed_at, access_count, metadata
                 FROM nodes WHERE lower(trim(name)) = ?1
                 ORDER BY created_at ASC, id ASC",
            )?;
            let rows = stmt.query_map(params![normalized], row_to_node)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    /// Upsert by id (§4.1).
    pub fn add_edge(&self, edge: &Edge) -> Result<()> {
        self.with_conn(|conn| Self::add_edge_stmt(conn, edge))
    }

    /// Inner form of [`Self::add_edge`]; see [`Self::add_node_stmt`].
    pub(crate) fn add_edge_stmt(conn: &Connection, edge: &Edge) -> Result<()> {
        conn.execute(
            "INSERT INTO edges (id, source_node_id, target_node_id, relation, weight, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                source_node_id = excluded.source_node_id,
                target_node_id = excluded.target_node_id,
                relation = excluded.relation,
                weight = excluded.weight",
            params![
                edge.id,
                edge.source_node_id,
                edge.target_node_id,
                edge.relation,
                edge.weight,
                edge.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Union of incoming and outgoing edges for `node_id` (§4.1).
    pub fn get_edges(&self, node_id: &str) -> Result<Vec<Edge>> {
        self.with_conn(|conn| Self::get_edges_stmt(conn, node_id))
    }

    /// Inner form of [`Self::get_edges`]; see [`Self::add_node_stmt`].
    pub(crate) fn get_edges_stmt(conn: &Connection, node_id: &str) -> Result<Vec<Edge>> {
        let mut stmt = conn.prepare(
            "SELECT id, source_node_id, target_node_id, relation, weight, created_at
             FROM edges WHERE source_node_id = ?1 OR target_node_id = ?1",
        )?;
        let rows = stmt.query_map(params![node_id], row_to_edge)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Direction-agnostic BFS up to `depth`, implemented as a single
    /// recursive query (§4.1 — "not N+1"). Returns `(node_id, depth)`
    /// pairs, excluding the origin.
    pub fn get_neighbors(&self, node_id: &str, depth: usize) -> Result<Vec<(String, usize)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "WITH RECURSIVE reach(id, depth) AS (
                    SELECT ?1, 0
                    UNION
                    SELECT
                        CASE WHEN e.source_node_id = r.id THEN e.target_node_id ELSE e.source_node_id END,
                        r.depth + 1
                    FROM edges e
                    JOIN reach r ON (e.source_node_id = r.id OR e.target_node_id = r.id)
                    WHERE r.depth < ?2
                )
                SELECT id, MIN(depth) as depth FROM reach WHERE id != ?1 GROUP BY id",
            )?;
            let rows = stmt.query_map(params![node_id, depth as i64], |row| {
                let id: String = row.get(0)?;
                let depth: i64 = row.get(1)?;
                Ok((id, depth as usize))
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    pub fn node_count(&self) -> Result<u64> {
        self.with_conn(|conn| {
            conn.query_row("SELECT count(*) FROM nodes", [], |row| row.get(0))
                .map_err(GraphStoreError::from)
        })
    }

    pub fn edge_count(&self) -> Result<u64> {
        self.with_conn(|conn| {
            conn.query_row("SELECT count(*) FROM edges", [], |row| row.get(0))
                .map_err(GraphStoreError::from)
        })
    }

    /// Batch bump `last_accessed_at = now, access_count += 1` (§4.1).
    pub fn update_access_time(&self, ids: &[String], now: DateTime<Utc>) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            {
                let mut stmt = tx.prepare(
                    "UPDATE nodes SET
                        last_accessed_at = CASE
                            WHEN last_accessed_at IS NULL OR last_accessed_at < ?2 THEN ?2
                            ELSE last_accessed_at
                        END,
                        access_count = access_count + 1
                     WHERE id = ?1",
                )?;
                for id in ids {
                    stmt.execute(params![id, now.to_rfc3339()])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_all_nodes(&self) -> Result<Vec<Node>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, node_type, description, embedding, created_at, last_accessed_at, access_count, metadata
                 FROM nodes",
            )?;
            let rows = stmt.query_map([], row_to_node)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    /// Removes incident edges along with the node (§4.1).
    pub fn delete_node(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| Self::delete_node_stmt(conn, id))
    }

    /// Inner form of [`Self::delete_node`]; see [`Self::add_node_stmt`].
    pub(crate) fn delete_node_stmt(conn: &Connection, id: &str) -> Result<()> {
        conn.execute(
            "DELETE FROM edges WHERE source_node_id = ?1 OR target_node_id = ?1",
            params![id],
        )?;
        conn.execute("DELETE FROM nodes WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn delete_edge(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| Self::delete_edge_stmt(conn, id))
    }

    /// Inner form of [`Self::delete_edge`]; see [`Self::add_node_stmt`].
    pub(crate) fn delete_edge_stmt(conn: &Connection, id: &str) -> Result<()> {
        conn.execute("DELETE FROM edges WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Terminal; subsequent calls to any other method fail with
    /// `GraphStoreError::Closed` (§4.1).
    pub fn close(&self) -> Result<()> {
        let mut guard = self.conn.lock().expect("graph store mutex poisoned");
        if let Some(conn) = guard.take() {
            let _ = conn.close();
        }
        Ok(())
    }
}
