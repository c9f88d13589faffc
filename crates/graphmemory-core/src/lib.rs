//! # Graphmemory Core
//!
//! An embeddable knowledge-graph memory engine for LLM-driven assistants.
//!
//! A caller submits free-form documents or structured memories; this crate
//! chunks them, extracts entities and relation triplets via a host-supplied
//! LLM client, embeds entities via a host-supplied embedding client, and
//! upserts the result into a typed property graph with deterministic,
//! content-derived ids. Every graph node and edge carries provenance back
//! to the memory (or memories) that produced it, so deleting a memory can
//! garbage-collect the graph state nothing else still references.
//!
//! On top of the graph sits a hybrid search engine (vector similarity,
//! graph expansion, or both fused), a recency/heat decay decorator that
//! re-scores results without mutating stored data, and a lifecycle module
//! that prunes aged-out or superseded memories and their now-orphaned
//! provenance.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use graphmemory_core::{AddMemoryInput, CancellationToken, Config, Engine};
//!
//! let engine = Engine::new(Config::default())?;
//! let cancellation = CancellationToken::new();
//!
//! let input = AddMemoryInput {
//!     topic: "Team decided to adopt Rust".to_string(),
//!     context: "Chose Rust for the new ingestion service.".to_string(),
//!     ..Default::default()
//! };
//! let result = engine.add_memory(input, &my_embedder, &my_llm, &cancellation).await?;
//! ```
//!
//! ## Feature flags
//!
//! - `bundled-sqlite` (default): statically link SQLite via `rusqlite`'s
//!   `bundled` feature, so no system SQLite is required.
//! - `vector-search` (default): HNSW approximate nearest-neighbour search
//!   via USearch for the persistent vector store. Without it, only the
//!   in-memory linear-scan store is available.

pub mod cancellation;
pub mod chunker;
pub mod config;
pub mod embeddings;
pub mod engine;
pub mod error;
pub mod graph_store;
pub mod ids;
pub mod ingestion;
pub mod lifecycle;
pub mod llm;
pub mod memory_store;
pub mod model;
pub mod schema;
pub mod search;
pub mod trace;
pub mod vector_store;

pub use cancellation::CancellationToken;
pub use chunker::{Chunker, SimpleChunker};
pub use config::{ChunkerConfig, Config, DecayBasis, DecayConfig, SearchConfig};
pub use embeddings::EmbeddingClient;
pub use engine::{AddMemoryInput, CognifyOptions, Engine, EngineStats, MemoryPatch};
pub use error::{
    classify_error, EmbeddingClientError, EngineError, EngineResult, ErrorClass, GraphStoreError,
    IngestionError, LlmClientError, MemoryStoreError, SearchError, VectorStoreError,
};
pub use ingestion::{CognifyResult, IngestionPipeline, IngestionResult, MemoryResult};
pub use lifecycle::{prune, PruneOptions, PruneResult};
pub use llm::{ExtractedEntity, ExtractedTriplet, ExtractionResult, LlmClient, SchemaTarget};
pub use model::{
    normalize_relation, Edge, MemoryFilters, MemoryOrder, MemoryRecord, MemoryStatus,
    MemorySummary, Node, NodeType, RetentionPolicy,
};
pub use search::{
    BaseSearchEngine, DecayingSearchEngine, SearchEngine, SearchHit, SearchMode, SearchOptions,
    SearchResponse,
};
pub use vector_store::{InMemoryVectorStore, VectorMatch, VectorStore};
#[cfg(feature = "vector-search")]
pub use vector_store::UsearchVectorStore;
