//! The façade (§6.5): `Engine` wires the graph store, vector store, memory
//! store, ingestion pipeline, search engine, and lifecycle manager behind
//! one set of public methods. It is `Send + Sync` — interior mutability
//! lives in the stores' own `Mutex`/`RwLock` guards, never behind `&mut self`.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::cancellation::CancellationToken;
use crate::chunker::{Chunker, SimpleChunker};
use crate::config::Config;
use crate::embeddings::EmbeddingClient;
use crate::error::{EngineError, MemoryStoreError};
use crate::graph_store::GraphStore;
use crate::ingestion::{IngestionPipeline, IngestionResult};
use crate::lifecycle::{prune, PruneOptions, PruneResult};
use crate::llm::LlmClient;
use crate::memory_store::MemoryStore;
use crate::model::{MemoryFilters, MemoryOrder, MemoryRecord, RetentionPolicy};
use crate::search::{
    BaseSearchEngine, DecayingSearchEngine, SearchEngine, SearchOptions, SearchResponse,
};
use crate::vector_store::{InMemoryVectorStore, VectorStore};
#[cfg(feature = "vector-search")]
use crate::vector_store::UsearchVectorStore;

/// Partial update accepted by `UpdateMemory` (§4.3). A field left `None`
/// keeps its current value. Recomputing the doc-hash from the resolved
/// content fields decides whether this is a metadata-only update or a
/// hash-changed re-ingestion.
#[derive(Debug, Clone, Default)]
pub struct MemoryPatch {
    pub topic: Option<String>,
    pub context: Option<String>,
    pub decisions: Option<Vec<String>>,
    pub rationale: Option<Vec<String>>,
    pub metadata: Option<serde_json::Value>,
}

/// Structured input accepted by `AddMemory` (§4.3/§4.4).
#[derive(Debug, Clone)]
pub struct AddMemoryInput {
    pub topic: String,
    pub context: String,
    pub decisions: Vec<String>,
    pub rationale: Vec<String>,
    pub source: String,
    pub retention_policy: RetentionPolicy,
    pub metadata: serde_json::Value,
    /// Memory ids this new memory supersedes (§4.3 Supersession).
    pub supersedes: Vec<String>,
}

impl Default for AddMemoryInput {
    fn default() -> Self {
        Self {
            topic: String::new(),
            context: String::new(),
            decisions: Vec::new(),
            rationale: Vec::new(),
            source: String::new(),
            retention_policy: RetentionPolicy::default(),
            metadata: serde_json::json!({}),
            supersedes: Vec::new(),
        }
    }
}

/// Options accepted by `Cognify` (§6.5).
#[derive(Debug, Clone, Default)]
pub struct CognifyOptions {
    pub skip_processed: bool,
    pub force: bool,
}

/// `Stats()` response (§6.5).
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    pub node_count: u64,
    pub edge_count: u64,
    pub memory_count: u64,
    pub buffered_docs: usize,
    pub last_cognified: Option<DateTime<Utc>>,
}

/// One document queued by `Add`, awaiting `Cognify` (§6.5, §5 "document
/// buffer... an in-process list with a mutex").
struct BufferedDoc {
    text: String,
    source: String,
}

/// The single public entry point of this crate.
pub struct Engine {
    graph: Arc<GraphStore>,
    memory: Arc<MemoryStore>,
    vectors: Arc<dyn VectorStore>,
    pipeline: IngestionPipeline,
    search_engine: Arc<dyn SearchEngine>,
    config: Config,
    buffer: Mutex<Vec<BufferedDoc>>,
    last_cognified: Mutex<Option<DateTime<Utc>>>,
}

impl Engine {
    /// `New(config) -> Engine` (§6.5). Validates configuration before any
    /// I/O, so a malformed `Config` never creates a database file or index.
    pub fn new(config: Config) -> Result<Self, EngineError> {
        config.validate()?;

        let graph = Arc::new(GraphStore::open(config.db_path.as_deref())?);
        let memory = Arc::new(MemoryStore::new(graph.clone()));
        let vectors = Self::open_vector_store(&config)?;

        let chunker: Arc<dyn Chunker> = Arc::new(SimpleChunker::new(
            config.chunker.max_tokens,
            config.chunker.overlap_tokens,
        ));
        let pipeline = IngestionPipeline::new(
            graph.clone(),
            memory.clone(),
            vectors.clone(),
            chunker,
            config.chunker.clone(),
        );

        let base: Arc<dyn SearchEngine> =
            Arc::new(BaseSearchEngine::new(graph.clone(), memory.clone(), vectors.clone()));
        let search_engine: Arc<dyn SearchEngine> = Arc::new(DecayingSearchEngine::new(
            base,
            graph.clone(),
            memory.clone(),
            config.decay.clone(),
        ));

        Ok(Self {
            graph,
            memory,
            vectors,
            pipeline,
            search_engine,
            config,
            buffer: Mutex::new(Vec::new()),
            last_cognified: Mutex::new(None),
        })
    }

    /// Persistent (USearch) store when a real db path is configured and the
    /// feature is compiled in; an in-memory linear-scan store otherwise
    /// (ephemeral mode, or the feature disabled) (§4.2, §6.4).
    fn open_vector_store(config: &Config) -> Result<Arc<dyn VectorStore>, EngineError> {
        #[cfg(feature = "vector-search")]
        {
            if !config.is_ephemeral() {
                if let Some(db_path) = &config.db_path {
                    let vector_path = db_path.with_extension("usearch");
                    let store =
                        UsearchVectorStore::open(&vector_path, config.embedding_dimensions)?;
                    return Ok(Arc::new(store));
                }
            }
        }
        Ok(Arc::new(InMemoryVectorStore::new()))
    }

    /// `Add(ctx, text, opts)` (§6.5): buffers `text` for a later `Cognify`.
    pub fn add(&self, text: &str, source: &str) {
        self.buffer
            .lock()
            .expect("buffer lock poisoned")
            .push(BufferedDoc {
                text: text.to_string(),
                source: source.to_string(),
            });
    }

    /// `Cognify(ctx, opts) -> CognifyResult` (§6.5): drains the buffer,
    /// running the three-phase ingestion pipeline over each document and
    /// summing their results into one `IngestionResult`.
    pub async fn cognify(
        &self,
        options: CognifyOptions,
        embedder: &dyn EmbeddingClient,
        llm: &dyn LlmClient,
        cancellation: &CancellationToken,
    ) -> Result<IngestionResult, EngineError> {
        cancellation.check()?;
        let docs: Vec<BufferedDoc> =
            std::mem::take(&mut *self.buffer.lock().expect("buffer lock poisoned"));

        let mut aggregate = IngestionResult::default();
        for doc in docs {
            cancellation.check()?;
            let result = self
                .pipeline
                .cognify(
                    &doc.text,
                    &doc.source,
                    options.skip_processed,
                    options.force,
                    embedder,
                    llm,
                    cancellation,
                )
                .await?;
            aggregate.documents_processed += result.documents_processed;
            aggregate.documents_skipped += result.documents_skipped;
            aggregate.chunks_processed += result.chunks_processed;
            aggregate.chunks_failed += result.chunks_failed;
            aggregate.nodes_created += result.nodes_created;
            aggregate.edges_created += result.edges_created;
            aggregate.edges_skipped += result.edges_skipped;
            aggregate.memories_superseded += result.memories_superseded;
            aggregate.errors.extend(result.errors);
        }

        *self
            .last_cognified
            .lock()
            .expect("last_cognified lock poisoned") = Some(Utc::now());
        Ok(aggregate)
    }

    /// `AddMemory(ctx, input) -> MemoryResult` (§6.5): structured input,
    /// doc-hash dedup, optional post-commit supersession.
    pub async fn add_memory(
        &self,
        input: AddMemoryInput,
        embedder: &dyn EmbeddingClient,
        llm: &dyn LlmClient,
        cancellation: &CancellationToken,
    ) -> Result<IngestionResult, EngineError> {
        cancellation.check()?;
        if input.topic.trim().is_empty() {
            return Err(EngineError::Validation("topic must not be empty".into()));
        }

        let mut result = self
            .pipeline
            .add_memory(
                &input.topic,
                &input.context,
                input.decisions,
                input.rationale,
                &input.source,
                input.retention_policy,
                input.metadata,
                embedder,
                llm,
                cancellation,
            )
            .await?;

        // Only a freshly-created memory (not a dedup hit) gets to supersede
        // anything — replaying the same AddMemory call must not re-fire
        // supersession side effects.
        if result.documents_skipped == 0 {
            if let Some(new_id) = result.memory_id.clone() {
                let now = Utc::now();
                for superseded_id in &input.supersedes {
                    self.memory
                        .record_supersession(&new_id, superseded_id, "superseded by AddMemory", now)?;
                    result.memories_superseded += 1;
                }
            }
        }

        Ok(result)
    }

    /// `GetMemory(ctx, id)` (§6.5). Does not touch access fields — only the
    /// façade's post-search `BatchUpdateMemoryAccess` call does (§4.5).
    pub fn get_memory(&self, id: &str) -> Result<Option<MemoryRecord>, EngineError> {
        Ok(self.memory.get_memory(id)?)
    }

    /// `ListMemories(ctx, opts)` (§6.5).
    pub fn list_memories(
        &self,
        offset: usize,
        limit: usize,
        filters: &MemoryFilters,
        order: MemoryOrder,
    ) -> Result<Vec<MemoryRecord>, EngineError> {
        Ok(self.memory.list_memories(offset, limit, filters, order)?)
    }

    /// `UpdateMemory(ctx, id, patch) -> MemoryResult` (§4.3): recomputes
    /// the doc-hash from the patched content fields. An unchanged hash is
    /// a metadata-only update; a changed hash clears old provenance and
    /// re-runs Phase 2+3 against the same memory id.
    pub async fn update_memory(
        &self,
        id: &str,
        patch: MemoryPatch,
        embedder: &dyn EmbeddingClient,
        llm: &dyn LlmClient,
        cancellation: &CancellationToken,
    ) -> Result<IngestionResult, EngineError> {
        cancellation.check()?;
        let existing = self
            .memory
            .get_memory(id)?
            .ok_or_else(|| EngineError::Memory(MemoryStoreError::NotFound(id.to_string())))?;

        let topic = patch.topic.unwrap_or(existing.topic);
        let context = patch.context.unwrap_or(existing.context);
        let decisions = patch.decisions.unwrap_or(existing.decisions);
        let rationale = patch.rationale.unwrap_or(existing.rationale);
        let new_hash = MemoryRecord::compute_doc_hash(&topic, &context, &decisions, &rationale);
        let now = Utc::now();

        if new_hash == existing.doc_hash {
            if let Some(metadata) = patch.metadata {
                self.memory.update_memory_metadata(id, &metadata, now)?;
            }
            return Ok(IngestionResult {
                memory_id: Some(id.to_string()),
                ..Default::default()
            });
        }

        self.memory
            .update_memory_content(id, &topic, &context, &decisions, &rationale, &new_hash, now)?;
        if let Some(metadata) = patch.metadata {
            self.memory.update_memory_metadata(id, &metadata, now)?;
        }
        self.memory.clear_provenance(id)?;

        let text = format!("Topic: {topic}\n\n{context}");
        let mut result = self
            .pipeline
            .run_extraction_and_write(id, &text, embedder, llm, cancellation)
            .await?;
        result.documents_processed = 1;
        result.memory_id = Some(id.to_string());
        Ok(result)
    }

    /// `DeleteMemory(ctx, id)` (§6.5). Provenance-aware GC of any now
    /// orphaned nodes/edges is `Prune`'s job, not this call's (§4.3).
    pub fn delete_memory(&self, id: &str) -> Result<(), EngineError> {
        Ok(self.memory.delete_memory(id)?)
    }

    /// `PinMemory(ctx, id, reason)` (§6.5).
    pub fn pin_memory(&self, id: &str, reason: Option<&str>) -> Result<(), EngineError> {
        Ok(self.memory.set_pinned(id, true, reason, Utc::now())?)
    }

    /// `UnpinMemory(ctx, id)` (§6.5).
    pub fn unpin_memory(&self, id: &str) -> Result<(), EngineError> {
        Ok(self.memory.set_pinned(id, false, None, Utc::now())?)
    }

    /// `Search(ctx, query, opts) -> SearchResponse` (§6.5, §4.5): embeds
    /// `query` internally for Vector/Hybrid modes (unused for Graph mode),
    /// runs the decay-wrapped search engine, then performs the single
    /// post-search `BatchUpdateMemoryAccess`/node `update_access_time` calls
    /// the access-monotonicity property depends on (Testable property 8).
    pub async fn search(
        &self,
        query: &str,
        embedder: &dyn EmbeddingClient,
        options: &SearchOptions,
        cancellation: &CancellationToken,
    ) -> Result<SearchResponse, EngineError> {
        cancellation.check()?;
        let response = self.search_engine.search(query, embedder, options).await?;
        let now = Utc::now();

        let node_ids: Vec<String> = response.hits.iter().map(|h| h.node_id.clone()).collect();
        if !node_ids.is_empty() {
            self.graph.update_access_time(&node_ids, now)?;
        }

        let memory_ids = response.memory_ids();
        if !memory_ids.is_empty() {
            self.memory.batch_update_memory_access(&memory_ids, now)?;
        }

        Ok(response)
    }

    /// `Prune(ctx, opts) -> PruneResult` (§6.5, §4.6).
    pub fn prune(&self, options: &PruneOptions) -> Result<PruneResult, EngineError> {
        prune(&self.graph, &self.memory, &self.vectors, &self.config.decay, options)
    }

    /// `Stats()` (§6.5).
    pub fn stats(&self) -> Result<EngineStats, EngineError> {
        Ok(EngineStats {
            node_count: self.graph.node_count()?,
            edge_count: self.graph.edge_count()?,
            memory_count: self.memory.memory_count()?,
            buffered_docs: self.buffer.lock().expect("buffer lock poisoned").len(),
            last_cognified: *self
                .last_cognified
                .lock()
                .expect("last_cognified lock poisoned"),
        })
    }

    /// `Close()` (§6.5): persists the vector index, then closes the shared
    /// connection. Terminal — further calls on either store return
    /// `GraphStoreError::Closed`/`VectorStoreError`.
    pub fn close(&self) -> Result<(), EngineError> {
        self.vectors.close()?;
        self.graph.close()?;
        Ok(())
    }
}
