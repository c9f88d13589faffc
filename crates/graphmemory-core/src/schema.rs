//! Database schema & migrations (§4.7).
//!
//! Applied on open via `PRAGMA user_version`, idempotent `CREATE ... IF NOT
//! EXISTS` / `ALTER TABLE ... ADD COLUMN` statements — grounded directly on
//! the teacher crate's `storage/migrations.rs` `MIGRATIONS` constant and
//! apply loop, generalised to this spec's node/edge/memory/provenance
//! tables instead of FSRS scheduling columns.

use rusqlite::Connection;

use crate::error::GraphStoreError;

/// A single migration step.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub up: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema: nodes, edges, memories, provenance",
        up: MIGRATION_V1_UP,
    },
    Migration {
        version: 2,
        description: "Supersession and processed-document tracking",
        up: MIGRATION_V2_UP,
    },
];

const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS nodes (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    node_type TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    embedding BLOB,
    created_at TEXT NOT NULL,
    last_accessed_at TEXT,
    access_count INTEGER NOT NULL DEFAULT 0,
    metadata TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_nodes_name_nocase ON nodes(name COLLATE NOCASE);
CREATE INDEX IF NOT EXISTS idx_nodes_created_at ON nodes(created_at);

CREATE TABLE IF NOT EXISTS edges (
    id TEXT PRIMARY KEY,
    source_node_id TEXT NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
    target_node_id TEXT NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
    relation TEXT NOT NULL,
    weight REAL NOT NULL DEFAULT 1.0,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source_node_id);
CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target_node_id);

CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY,
    topic TEXT NOT NULL,
    context TEXT NOT NULL DEFAULT '',
    decisions TEXT NOT NULL DEFAULT '[]',
    rationale TEXT NOT NULL DEFAULT '[]',
    metadata TEXT NOT NULL DEFAULT '{}',
    status TEXT NOT NULL DEFAULT 'pending',
    version INTEGER NOT NULL DEFAULT 1,
    doc_hash TEXT NOT NULL,
    source TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    last_accessed_at TEXT,
    access_count INTEGER NOT NULL DEFAULT 0,
    access_velocity REAL NOT NULL DEFAULT 0.0,
    retention_policy TEXT NOT NULL DEFAULT 'standard',
    retention_until TEXT,
    pinned INTEGER NOT NULL DEFAULT 0,
    pinned_at TEXT,
    pin_reason TEXT,
    superseded_by TEXT
);

CREATE INDEX IF NOT EXISTS idx_memories_doc_hash ON memories(doc_hash);
CREATE INDEX IF NOT EXISTS idx_memories_status ON memories(status);
CREATE INDEX IF NOT EXISTS idx_memories_last_accessed_at ON memories(last_accessed_at);

CREATE TABLE IF NOT EXISTS memory_nodes (
    memory_id TEXT NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
    node_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (memory_id, node_id)
);

CREATE INDEX IF NOT EXISTS idx_memory_nodes_node_id ON memory_nodes(node_id);

CREATE TABLE IF NOT EXISTS memory_edges (
    memory_id TEXT NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
    edge_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (memory_id, edge_id)
);

CREATE INDEX IF NOT EXISTS idx_memory_edges_edge_id ON memory_edges(edge_id);
"#;

const MIGRATION_V2_UP: &str = r#"
CREATE TABLE IF NOT EXISTS memory_supersession (
    id TEXT PRIMARY KEY,
    superseding_id TEXT NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
    superseded_id TEXT NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
    reason TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_supersession_superseding ON memory_supersession(superseding_id);
CREATE INDEX IF NOT EXISTS idx_supersession_superseded ON memory_supersession(superseded_id);

CREATE TABLE IF NOT EXISTS processed_documents (
    content_hash TEXT PRIMARY KEY,
    source TEXT NOT NULL DEFAULT '',
    processed_at TEXT NOT NULL,
    chunk_count INTEGER NOT NULL DEFAULT 0
);
"#;

/// Apply all migrations newer than the connection's current `user_version`.
pub fn apply_migrations(conn: &Connection) -> Result<(), GraphStoreError> {
    let current_version: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            conn.execute_batch(migration.up)?;
            conn.pragma_update(None, "user_version", migration.version)?;
            tracing::debug!(
                version = migration.version,
                description = migration.description,
                "applied migration"
            );
        }
    }

    Ok(())
}
