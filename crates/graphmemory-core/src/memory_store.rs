//! Memory store (§4.3): CRUD, provenance links, and supersession for
//! [`MemoryRecord`]s, sharing the graph store's connection rather than
//! opening a second handle onto the same database file (§9).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::error::MemoryStoreError;
use crate::graph_store::GraphStore;
use crate::model::{
    MemoryFilters, MemoryOrder, MemoryRecord, MemoryStatus, RetentionPolicy, Supersession,
    DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT,
};

type Result<T> = std::result::Result<T, MemoryStoreError>;

fn row_to_memory(row: &rusqlite::Row) -> rusqlite::Result<MemoryRecord> {
    let status_str: String = row.get("status")?;
    let retention_str: String = row.get("retention_policy")?;
    let decisions_str: String = row.get("decisions")?;
    let rationale_str: String = row.get("rationale")?;
    let metadata_str: String = row.get("metadata")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let last_accessed_at: Option<String> = row.get("last_accessed_at")?;
    let retention_until: Option<String> = row.get("retention_until")?;
    let pinned_at: Option<String> = row.get("pinned_at")?;

    Ok(MemoryRecord {
        id: row.get("id")?,
        topic: row.get("topic")?,
        context: row.get("context")?,
        decisions: serde_json::from_str(&decisions_str).unwrap_or_default(),
        rationale: serde_json::from_str(&rationale_str).unwrap_or_default(),
        metadata: serde_json::from_str(&metadata_str).unwrap_or(serde_json::Value::Null),
        status: MemoryStatus::parse_name(&status_str).unwrap_or(MemoryStatus::Pending),
        version: row.get::<_, i64>("version")? as u64,
        doc_hash: row.get("doc_hash")?,
        source: row.get("source")?,
        created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
        updated_at: updated_at.parse().unwrap_or_else(|_| Utc::now()),
        last_accessed_at: last_accessed_at.and_then(|s| s.parse().ok()),
        access_count: row.get::<_, i64>("access_count")? as u64,
        access_velocity: row.get("access_velocity")?,
        retention_policy: RetentionPolicy::parse_name(&retention_str).unwrap_or_default(),
        retention_until: retention_until.and_then(|s| s.parse().ok()),
        pinned: row.get::<_, i64>("pinned")? != 0,
        pinned_at: pinned_at.and_then(|s| s.parse().ok()),
        pin_reason: row.get("pin_reason")?,
        superseded_by: row.get("superseded_by")?,
        node_ids: Vec::new(),
        edge_ids: Vec::new(),
    })
}

/// The memory store (§4.3).
pub struct MemoryStore {
    graph: Arc<GraphStore>,
}

impl MemoryStore {
    /// Share the connection owned by `graph` rather than opening a second
    /// handle onto the same file (§9 "Cyclic ownership").
    pub fn new(graph: Arc<GraphStore>) -> Self {
        Self { graph }
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        self.graph.with_shared_connection(f)
    }

    /// Run `f` inside a single SQL transaction shared with the graph store
    /// (§4.4 step 3, §4.6 step 5, §7). See [`GraphStore::with_transaction`].
    pub fn with_transaction<T, E>(
        &self,
        f: impl FnOnce(&Connection) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E>
    where
        E: From<crate::error::GraphStoreError>,
    {
        self.graph.with_transaction(f)
    }

    /// Insert with status `pending` (Phase 1 of §4.4).
    pub fn add_memory(&self, record: &MemoryRecord) -> Result<()> {
        self.with_conn(|conn| {
            let decisions = serde_json::to_string(&record.decisions)?;
            let rationale = serde_json::to_string(&record.rationale)?;
            let metadata = serde_json::to_string(&record.metadata)?;
            conn.execute(
                "INSERT INTO memories (
                    id, topic, context, decisions, rationale, metadata, status, version,
                    doc_hash, source, created_at, updated_at, last_accessed_at, access_count,
                    access_velocity, retention_policy, retention_until, pinned, pinned_at,
                    pin_reason, superseded_by
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21)",
                params![
                    record.id,
                    record.topic,
                    record.context,
                    decisions,
                    rationale,
                    metadata,
                    record.status.as_str(),
                    record.version as i64,
                    record.doc_hash,
                    record.source,
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                    record.last_accessed_at.map(|t| t.to_rfc3339()),
                    record.access_count as i64,
                    record.access_velocity,
                    record.retention_policy.as_str(),
                    record.retention_until.map(|t| t.to_rfc3339()),
                    record.pinned as i64,
                    record.pinned_at.map(|t| t.to_rfc3339()),
                    record.pin_reason,
                    record.superseded_by,
                ],
            )?;
            Ok(())
        })
    }

    /// Look up a non-pending memory by `doc_hash` (Phase 1 dedup, §4.4).
    pub fn find_by_doc_hash(&self, doc_hash: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id FROM memories WHERE doc_hash = ?1 AND status != 'pending'",
                params![doc_hash],
                |row| row.get(0),
            )
            .optional()
            .map_err(MemoryStoreError::from)
        })
    }

    /// Does **not** touch `last_accessed_at` (§4.5 double-counting
    /// avoidance) — populates provenance id lists from the junction tables.
    pub fn get_memory(&self, id: &str) -> Result<Option<MemoryRecord>> {
        self.with_conn(|conn| {
            let mut record = match conn
                .query_row(
                    "SELECT * FROM memories WHERE id = ?1",
                    params![id],
                    row_to_memory,
                )
                .optional()?
            {
                Some(r) => r,
                None => return Ok(None),
            };

            let mut node_stmt = conn.prepare(
                "SELECT node_id FROM memory_nodes WHERE memory_id = ?1 ORDER BY created_at ASC",
            )?;
            record.node_ids = node_stmt
                .query_map(params![id], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;

            let mut edge_stmt = conn.prepare(
                "SELECT edge_id FROM memory_edges WHERE memory_id = ?1 ORDER BY created_at ASC",
            )?;
            record.edge_ids = edge_stmt
                .query_map(params![id], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;

            Ok(Some(record))
        })
    }

    /// `ListMemories(offset, limit, filters)` (§4.3).
    pub fn list_memories(
        &self,
        offset: usize,
        limit: usize,
        filters: &MemoryFilters,
        order: MemoryOrder,
    ) -> Result<Vec<MemoryRecord>> {
        let limit = if limit == 0 {
            DEFAULT_LIST_LIMIT
        } else {
            limit.min(MAX_LIST_LIMIT)
        };

        self.with_conn(|conn| {
            let mut clauses = Vec::new();
            let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(status) = filters.status {
                clauses.push("status = ?".to_string());
                values.push(Box::new(status.as_str()));
            }
            if let Some(policy) = filters.retention_policy {
                clauses.push("retention_policy = ?".to_string());
                values.push(Box::new(policy.as_str()));
            }
            if let Some(pinned) = filters.pinned {
                clauses.push("pinned = ?".to_string());
                values.push(Box::new(pinned as i64));
            }

            let where_clause = if clauses.is_empty() {
                String::new()
            } else {
                format!("WHERE {}", clauses.join(" AND "))
            };

            let order_clause = match order {
                MemoryOrder::CreatedAtDesc => "created_at DESC",
                MemoryOrder::UpdatedAtDesc => "updated_at DESC",
                MemoryOrder::LastAccessedAtDesc => "last_accessed_at DESC",
            };

            let sql = format!(
                "SELECT * FROM memories {where_clause} ORDER BY {order_clause} LIMIT ? OFFSET ?"
            );
            values.push(Box::new(limit as i64));
            values.push(Box::new(offset as i64));

            let mut stmt = conn.prepare(&sql)?;
            let param_refs: Vec<&dyn rusqlite::ToSql> =
                values.iter().map(|v| v.as_ref()).collect();
            let rows = stmt.query_map(param_refs.as_slice(), row_to_memory)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    /// Metadata + version bump only, when `doc_hash` is unchanged (§4.3
    /// `UpdateMemory` fast path).
    pub fn update_memory_metadata(
        &self,
        id: &str,
        metadata: &serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            let metadata_str = serde_json::to_string(metadata)?;
            conn.execute(
                "UPDATE memories SET metadata = ?2, version = version + 1, updated_at = ?3 WHERE id = ?1",
                params![id, metadata_str, now.to_rfc3339()],
            )?;
            Ok(())
        })
    }

    /// Full field update plus status reset to `pending`, used before
    /// Phase 2+3 re-ingestion when `doc_hash` changed (§4.3).
    pub fn update_memory_content(
        &self,
        id: &str,
        topic: &str,
        context: &str,
        decisions: &[String],
        rationale: &[String],
        doc_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            let decisions_str = serde_json::to_string(decisions)?;
            let rationale_str = serde_json::to_string(rationale)?;
            conn.execute(
                "UPDATE memories SET
                    topic = ?2, context = ?3, decisions = ?4, rationale = ?5,
                    doc_hash = ?6, status = 'pending', version = version + 1, updated_at = ?7
                 WHERE id = ?1",
                params![
                    id,
                    topic,
                    context,
                    decisions_str,
                    rationale_str,
                    doc_hash,
                    now.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn mark_complete(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| Self::mark_complete_stmt(conn, id, now))
    }

    /// Inner form of [`Self::mark_complete`] taking a live `&Connection` so
    /// callers composing a multi-statement transaction (ingestion Phase 3,
    /// §4.4) can run it without re-acquiring the connection mutex.
    pub(crate) fn mark_complete_stmt(conn: &Connection, id: &str, now: DateTime<Utc>) -> Result<()> {
        conn.execute(
            "UPDATE memories SET status = 'complete', updated_at = ?2 WHERE id = ?1",
            params![id, now.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn link_node(&self, memory_id: &str, node_id: &str, now: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| Self::link_node_stmt(conn, memory_id, node_id, now))
    }

    /// Inner form of [`Self::link_node`]; see [`Self::mark_complete_stmt`].
    pub(crate) fn link_node_stmt(
        conn: &Connection,
        memory_id: &str,
        node_id: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO memory_nodes (memory_id, node_id, created_at) VALUES (?1, ?2, ?3)",
            params![memory_id, node_id, now.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn link_edge(&self, memory_id: &str, edge_id: &str, now: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| Self::link_edge_stmt(conn, memory_id, edge_id, now))
    }

    /// Inner form of [`Self::link_edge`]; see [`Self::mark_complete_stmt`].
    pub(crate) fn link_edge_stmt(
        conn: &Connection,
        memory_id: &str,
        edge_id: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO memory_edges (memory_id, edge_id, created_at) VALUES (?1, ?2, ?3)",
            params![memory_id, edge_id, now.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Delete all provenance rows for `memory_id`, used before re-ingestion
    /// on the hash-changed `UpdateMemory` path (§4.4 Phase 3).
    pub fn clear_provenance(&self, memory_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM memory_nodes WHERE memory_id = ?1",
                params![memory_id],
            )?;
            conn.execute(
                "DELETE FROM memory_edges WHERE memory_id = ?1",
                params![memory_id],
            )?;
            Ok(())
        })
    }

    /// Cascade via foreign keys (§4.3). Provenance-aware GC of orphaned
    /// nodes/edges is the caller's responsibility (lifecycle module), since
    /// it must also touch the graph store.
    pub fn delete_memory(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| Self::delete_memory_stmt(conn, id))
    }

    /// Inner form of [`Self::delete_memory`]; see [`Self::mark_complete_stmt`].
    pub(crate) fn delete_memory_stmt(conn: &Connection, id: &str) -> Result<()> {
        conn.execute("DELETE FROM memories WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn set_pinned(
        &self,
        id: &str,
        pinned: bool,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE memories SET
                    pinned = ?2,
                    pinned_at = CASE WHEN ?2 = 1 THEN ?3 ELSE NULL END,
                    pin_reason = CASE WHEN ?2 = 1 THEN ?4 ELSE NULL END,
                    status = CASE WHEN ?2 = 1 THEN 'Pinned' ELSE status END
                 WHERE id = ?1",
                params![id, pinned as i64, now.to_rfc3339(), reason],
            )?;
            Ok(())
        })
    }

    /// Bump access-count, set last-accessed-at, recompute
    /// access-velocity (§4.3).
    pub fn batch_update_memory_access(&self, ids: &[String], now: DateTime<Utc>) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            {
                let mut stmt = tx.prepare(
                    "UPDATE memories SET
                        access_count = access_count + 1,
                        last_accessed_at = ?2,
                        access_velocity = CAST(access_count + 1 AS REAL) /
                            MAX(1.0, (julianday(?2) - julianday(created_at)))
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

    pub fn update_memory_access(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        self.batch_update_memory_access(std::slice::from_ref(&id.to_string()), now)
    }

    /// Inserts a supersession row and flips the superseded memory's status
    /// (§4.3, §4.6).
    pub fn record_supersession(
        &self,
        superseding_id: &str,
        superseded_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Supersession> {
        let record = Supersession {
            id: crate::ids::hash_canonical_json(&serde_json::json!({
                "superseded": superseded_id,
                "superseding": superseding_id,
            })),
            superseding_id: superseding_id.to_string(),
            superseded_id: superseded_id.to_string(),
            reason: reason.to_string(),
            created_at: now,
        };

        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "INSERT OR IGNORE INTO memory_supersession (id, superseding_id, superseded_id, reason, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.id,
                    record.superseding_id,
                    record.superseded_id,
                    record.reason,
                    record.created_at.to_rfc3339(),
                ],
            )?;
            tx.execute(
                "UPDATE memories SET status = 'Superseded', superseded_by = ?2, updated_at = ?3 WHERE id = ?1",
                params![superseded_id, superseding_id, now.to_rfc3339()],
            )?;
            tx.commit()?;
            Ok(())
        })?;

        Ok(record)
    }

    /// Single batched query (§4.3): for each node id, an ordered list of
    /// memory ids (newest updated first). Legacy nodes yield empty lists.
    pub fn get_memories_by_node_ids(
        &self,
        node_ids: &[String],
    ) -> Result<std::collections::HashMap<String, Vec<String>>> {
        let mut out: std::collections::HashMap<String, Vec<String>> = node_ids
            .iter()
            .map(|id| (id.clone(), Vec::new()))
            .collect();

        if node_ids.is_empty() {
            return Ok(out);
        }

        self.with_conn(|conn| {
            let placeholders = node_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            let sql = format!(
                "SELECT mn.node_id, m.id
                 FROM memory_nodes mn
                 JOIN memories m ON m.id = mn.memory_id
                 WHERE mn.node_id IN ({placeholders})
                 ORDER BY m.updated_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(node_ids.iter()), |row| {
                let node_id: String = row.get(0)?;
                let memory_id: String = row.get(1)?;
                Ok((node_id, memory_id))
            })?;
            for row in rows {
                let (node_id, memory_id) = row?;
                out.entry(node_id).or_default().push(memory_id);
            }
            Ok(())
        })?;

        Ok(out)
    }

    /// For GC refcount (§4.3, §4.6).
    pub fn count_memory_references(&self, node_id: &str) -> Result<u64> {
        self.with_conn(|conn| Self::count_memory_references_stmt(conn, node_id))
    }

    /// Inner form of [`Self::count_memory_references`]; see
    /// [`Self::mark_complete_stmt`]. Used by lifecycle pruning to re-check a
    /// node's refcount from inside the same transaction that deleted its
    /// memories (§4.6 step 5), not a separate auto-committing read.
    pub(crate) fn count_memory_references_stmt(conn: &Connection, node_id: &str) -> Result<u64> {
        conn.query_row(
            "SELECT count(*) FROM memory_nodes WHERE node_id = ?1",
            params![node_id],
            |row| row.get(0),
        )
        .map_err(MemoryStoreError::from)
    }

    pub fn count_edge_references(&self, edge_id: &str) -> Result<u64> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT count(*) FROM memory_edges WHERE edge_id = ?1",
                params![edge_id],
                |row| row.get(0),
            )
            .map_err(MemoryStoreError::from)
        })
    }

    pub fn memory_count(&self) -> Result<u64> {
        self.with_conn(|conn| {
            conn.query_row("SELECT count(*) FROM memories", [], |row| row.get(0))
                .map_err(MemoryStoreError::from)
        })
    }

    pub fn mark_document_processed(
        &self,
        content_hash: &str,
        source: &str,
        chunk_count: usize,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO processed_documents (content_hash, source, processed_at, chunk_count)
                 VALUES (?1, ?2, ?3, ?4)",
                params![content_hash, source, now.to_rfc3339(), chunk_count as i64],
            )?;
            Ok(())
        })
    }

    pub fn is_document_processed(&self, content_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT count(*) FROM processed_documents WHERE content_hash = ?1",
                params![content_hash],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }
}
