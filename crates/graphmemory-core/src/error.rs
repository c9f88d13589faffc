//! Error taxonomy.
//!
//! Each layer owns a narrow `thiserror` enum; [`EngineError`] is the single
//! type that crosses the façade boundary (§6.5 of the design spec). Error
//! classification (§4.8) is a pure function over the top-level error so
//! callers and trace exporters can bucket failures without matching on
//! every concrete variant.

use thiserror::Error;

/// Errors from the graph store (nodes, edges, adjacency).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum GraphStoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("store is closed")]
    Closed,
    #[error("invalid node data: {0}")]
    InvalidNode(String),
}

/// Errors from a vector store implementation.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("index error: {0}")]
    Index(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the memory store (CRUD, provenance, supersession).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum MemoryStoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("memory not found: {0}")]
    NotFound(String),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid retention policy: {0}")]
    InvalidRetentionPolicy(String),
    #[error(transparent)]
    Graph(#[from] GraphStoreError),
}

/// Errors surfaced by the embedding client consumer contract.
#[non_exhaustive]
#[derive(Debug, Error, Clone)]
pub enum EmbeddingClientError {
    #[error("embedding request failed: {0}")]
    Request(String),
    #[error("embedding batch too large: {0} items")]
    BatchTooLarge(usize),
}

/// Errors surfaced by the LLM client consumer contract.
#[non_exhaustive]
#[derive(Debug, Error, Clone)]
pub enum LlmClientError {
    #[error("llm request failed: {0}")]
    Request(String),
    #[error("llm response was not valid JSON: {0}")]
    InvalidJson(String),
    #[error("llm response did not match the requested schema: {0}")]
    SchemaMismatch(String),
    #[error("llm request timed out")]
    Timeout,
}

/// A single ingestion-time error (chunk, extraction, embedding, or edge
/// resolution failure) collected into `CognifyResult`/`MemoryResult`
/// instead of aborting the whole document (§7).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IngestionError {
    /// Which stage produced the error: "chunk", "extract", "embed", "edge".
    pub stage: String,
    /// Human-readable description.
    pub message: String,
    /// Index of the chunk this error pertains to, if applicable.
    pub chunk_index: Option<usize>,
}

impl IngestionError {
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
            chunk_index: None,
        }
    }

    pub fn with_chunk(mut self, index: usize) -> Self {
        self.chunk_index = Some(index);
        self
    }
}

/// Errors from the search engine.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("graph mode requires at least one seed node id")]
    MissingSeeds,
    #[error(transparent)]
    Graph(#[from] GraphStoreError),
    #[error(transparent)]
    Vector(#[from] VectorStoreError),
    #[error(transparent)]
    Memory(#[from] MemoryStoreError),
    #[error(transparent)]
    Embedding(#[from] EmbeddingClientError),
}

/// The single error type returned by every `Engine` public method.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("operation was cancelled")]
    Cancelled,
    #[error(transparent)]
    Graph(#[from] GraphStoreError),
    #[error(transparent)]
    Vector(#[from] VectorStoreError),
    #[error(transparent)]
    Memory(#[from] MemoryStoreError),
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error(transparent)]
    Llm(#[from] LlmClientError),
    #[error(transparent)]
    Embedding(#[from] EmbeddingClientError),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// The error classes of §4.8, used to label traces and surfaced errors.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorClass {
    Timeout,
    Network,
    Llm,
    Database,
    Validation,
    Unknown,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Timeout => "timeout",
            ErrorClass::Network => "network",
            ErrorClass::Llm => "llm",
            ErrorClass::Database => "database",
            ErrorClass::Validation => "validation",
            ErrorClass::Unknown => "unknown",
        }
    }
}

/// Classify an arbitrary error using substring/sentinel heuristics (§4.8).
///
/// This intentionally looks at the `Display` text rather than trying to
/// downcast every possible source error, since the taxonomy must also
/// classify errors from host-supplied `LlmClient`/`EmbeddingClient`
/// implementations this crate can't know the concrete type of.
pub fn classify_error(err: &(dyn std::error::Error + 'static)) -> ErrorClass {
    let text = err.to_string().to_lowercase();

    if text.contains("timeout") || text.contains("timed out") || text.contains("deadline") {
        return ErrorClass::Timeout;
    }
    if text.contains("connection")
        || text.contains("network")
        || text.contains("dns")
        || text.contains("unreachable")
    {
        return ErrorClass::Network;
    }
    if text.contains("llm") || text.contains("schema") || text.contains("json") {
        return ErrorClass::Llm;
    }
    if text.contains("database") || text.contains("sqlite") || text.contains("sql") {
        return ErrorClass::Database;
    }
    if text.contains("validation") || text.contains("invalid") {
        return ErrorClass::Validation;
    }
    ErrorClass::Unknown
}
