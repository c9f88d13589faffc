//! Ingestion pipeline (§4.4): the three-phase Cognify / AddMemory protocol.

mod pipeline;

pub use pipeline::IngestionPipeline;

use serde::{Deserialize, Serialize};

use crate::error::IngestionError;
use crate::trace::Trace;

/// Unchanged fields across `CognifyResult`/`MemoryResult` (§4.4.2).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestionResult {
    pub documents_processed: u64,
    pub documents_skipped: u64,
    pub chunks_processed: u64,
    pub chunks_failed: u64,
    pub nodes_created: u64,
    pub edges_created: u64,
    pub edges_skipped: u64,
    pub memories_superseded: u64,
    pub errors: Vec<IngestionError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Trace>,
    /// Populated for the `AddMemory` path only; empty for `Cognify`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_id: Option<String>,
}

/// Alias kept distinct at the call site (`Cognify(..) -> CognifyResult`,
/// `AddMemory(..) -> MemoryResult`) even though the shape is identical (§4.4.2).
pub type CognifyResult = IngestionResult;
pub type MemoryResult = IngestionResult;
