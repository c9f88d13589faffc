//! Provenance, supersession, and processed-document records (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A `(memory_id, node_id, created_at)` provenance row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryNodeLink {
    pub memory_id: String,
    pub node_id: String,
    pub created_at: DateTime<Utc>,
}

/// A `(memory_id, edge_id, created_at)` provenance row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEdgeLink {
    pub memory_id: String,
    pub edge_id: String,
    pub created_at: DateTime<Utc>,
}

/// A supersession record (§3, §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supersession {
    pub id: String,
    pub superseding_id: String,
    pub superseded_id: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// A row in `processed_documents`, used for incremental `Cognify`
/// deduplication (§4.6 "Incremental ingestion").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedDocument {
    pub content_hash: String,
    pub source: String,
    pub processed_at: DateTime<Utc>,
    pub chunk_count: usize,
}
