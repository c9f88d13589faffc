//! The data model (§3): nodes, edges, memories, and provenance.

pub mod edge;
pub mod memory;
pub mod node;
pub mod provenance;

pub use edge::{normalize_relation, Edge};
pub use memory::{
    MemoryFilters, MemoryOrder, MemoryRecord, MemoryStatus, MemorySummary, RetentionPolicy,
    DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT,
};
pub use node::{Node, NodeType};
pub use provenance::{MemoryEdgeLink, MemoryNodeLink, ProcessedDocument, Supersession};
