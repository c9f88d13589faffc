//! The three-phase ingestion pipeline (§4.4): a short transaction to claim
//! a `pending` memory row, unbounded-duration extraction/embedding work
//! held outside any transaction, then a short transaction to write the
//! graph/vector/provenance rows and flip the memory to `complete`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;

use crate::cancellation::CancellationToken;
use crate::chunker::Chunker;
use crate::config::ChunkerConfig;
use crate::embeddings::{sub_batches, EmbeddingClient};
use crate::error::{EngineError, IngestionError};
use crate::graph_store::GraphStore;
use crate::ids;
use crate::llm::{
    normalize_extraction_response, ExtractedEntity, ExtractedTriplet, LlmClient, SchemaTarget,
};
use crate::memory_store::MemoryStore;
use crate::model::{MemoryRecord, MemoryStatus, Node, NodeType, RetentionPolicy};
use crate::trace::{SpanKind, Trace};
use crate::vector_store::VectorStore;

use super::IngestionResult;

/// Per-chunk entity name -> observed types, used for edge endpoint
/// resolution (§4.4.1). More than one type for the same normalised name
/// within a chunk makes that name ambiguous.
struct EntityMap {
    by_name: HashMap<String, HashSet<NodeType>>,
    ids_by_name_and_type: HashMap<(String, NodeType), String>,
}

impl EntityMap {
    fn build(entities: &[ExtractedEntity]) -> Self {
        let mut by_name: HashMap<String, HashSet<NodeType>> = HashMap::new();
        let mut ids_by_name_and_type = HashMap::new();

        for entity in entities {
            let normalized = ids::normalize_name(&entity.name);
            let (node_type, _recognised) = NodeType::parse_name(&entity.node_type);
            by_name.entry(normalized.clone()).or_default().insert(node_type);
            let node_id = ids::generate_deterministic_node_id(&entity.name, node_type.as_str());
            ids_by_name_and_type.insert((normalized, node_type), node_id);
        }

        Self {
            by_name,
            ids_by_name_and_type,
        }
    }

    /// Resolve a triplet endpoint name to its node id, or `None` if the
    /// name is unknown or ambiguous in this chunk (§4.4.1).
    fn resolve(&self, name: &str) -> Option<String> {
        let normalized = ids::normalize_name(name);
        let types = self.by_name.get(&normalized)?;
        if types.len() != 1 {
            return None;
        }
        let node_type = *types.iter().next().unwrap();
        self.ids_by_name_and_type
            .get(&(normalized, node_type))
            .cloned()
    }
}

/// Coordinates the graph store, vector store, and memory store through one
/// ingestion call. Holds no state of its own beyond `Arc` handles to the
/// stores it writes to.
pub struct IngestionPipeline {
    graph: Arc<GraphStore>,
    memory: Arc<MemoryStore>,
    vectors: Arc<dyn VectorStore>,
    chunker: Arc<dyn Chunker>,
    chunker_config: ChunkerConfig,
}

impl IngestionPipeline {
    pub fn new(
        graph: Arc<GraphStore>,
        memory: Arc<MemoryStore>,
        vectors: Arc<dyn VectorStore>,
        chunker: Arc<dyn Chunker>,
        chunker_config: ChunkerConfig,
    ) -> Self {
        Self {
            graph,
            memory,
            vectors,
            chunker,
            chunker_config,
        }
    }

    /// `AddMemory` (§4.4): structured input, doc-hash dedup against
    /// non-pending memories.
    pub async fn add_memory(
        &self,
        topic: &str,
        context: &str,
        decisions: Vec<String>,
        rationale: Vec<String>,
        source: &str,
        retention_policy: RetentionPolicy,
        metadata: serde_json::Value,
        embedder: &dyn EmbeddingClient,
        llm: &dyn LlmClient,
        cancellation: &CancellationToken,
    ) -> Result<IngestionResult, EngineError> {
        cancellation.check()?;
        let doc_hash = MemoryRecord::compute_doc_hash(topic, context, &decisions, &rationale);

        if let Some(existing_id) = self.memory.find_by_doc_hash(&doc_hash)? {
            return Ok(IngestionResult {
                documents_skipped: 1,
                memory_id: Some(existing_id),
                ..Default::default()
            });
        }

        let now = Utc::now();
        let memory_id = format!("mem_{}", &doc_hash[..16]);
        let record = MemoryRecord {
            id: memory_id.clone(),
            topic: topic.to_string(),
            context: context.to_string(),
            decisions,
            rationale,
            metadata,
            status: MemoryStatus::Pending,
            version: 1,
            doc_hash,
            source: source.to_string(),
            created_at: now,
            updated_at: now,
            last_accessed_at: None,
            access_count: 0,
            access_velocity: 0.0,
            retention_policy,
            retention_until: None,
            pinned: false,
            pinned_at: None,
            pin_reason: None,
            superseded_by: None,
            node_ids: Vec::new(),
            edge_ids: Vec::new(),
        };
        self.memory.add_memory(&record)?;

        let text = format!("Topic: {topic}\n\n{context}");
        let mut result = self
            .run_extraction_and_write(&memory_id, &text, embedder, llm, cancellation)
            .await?;
        result.documents_processed = 1;
        result.memory_id = Some(memory_id);
        Ok(result)
    }

    /// `Cognify` (§4.4): raw text, content-hash dedup against
    /// `processed_documents` unless `force` is set.
    pub async fn cognify(
        &self,
        text: &str,
        source: &str,
        skip_processed: bool,
        force: bool,
        embedder: &dyn EmbeddingClient,
        llm: &dyn LlmClient,
        cancellation: &CancellationToken,
    ) -> Result<IngestionResult, EngineError> {
        cancellation.check()?;
        let content_hash = ids::hash_canonical_json(&serde_json::json!({ "text": text.trim() }));

        if skip_processed && !force && self.memory.is_document_processed(&content_hash)? {
            return Ok(IngestionResult {
                documents_skipped: 1,
                ..Default::default()
            });
        }

        let now = Utc::now();
        let doc_hash = MemoryRecord::compute_doc_hash(source, text, &[], &[]);
        let memory_id = format!("doc_{}", &content_hash[..16]);
        let record = MemoryRecord {
            id: memory_id.clone(),
            topic: source.to_string(),
            context: text.to_string(),
            decisions: Vec::new(),
            rationale: Vec::new(),
            metadata: serde_json::json!({}),
            status: MemoryStatus::Pending,
            version: 1,
            doc_hash,
            source: source.to_string(),
            created_at: now,
            updated_at: now,
            last_accessed_at: None,
            access_count: 0,
            access_velocity: 0.0,
            retention_policy: RetentionPolicy::Standard,
            retention_until: None,
            pinned: false,
            pinned_at: None,
            pin_reason: None,
            superseded_by: None,
            node_ids: Vec::new(),
            edge_ids: Vec::new(),
        };
        self.memory.add_memory(&record)?;

        let mut result = self
            .run_extraction_and_write(&memory_id, text, embedder, llm, cancellation)
            .await?;
        result.documents_processed = 1;
        self.memory
            .mark_document_processed(&content_hash, source, result.chunks_processed as usize, now)?;
        Ok(result)
    }

    /// Phase 2 (chunk/extract/embed, no transaction) followed by Phase 3
    /// (short transaction: write graph/vector/provenance, mark complete).
    /// `pub(crate)` so the façade's hash-changed `UpdateMemory` path (§4.3)
    /// can re-run Phase 2+3 against an already-`pending` memory row without
    /// going through `add_memory`/`cognify`'s dedup checks again.
    pub(crate) async fn run_extraction_and_write(
        &self,
        memory_id: &str,
        text: &str,
        embedder: &dyn EmbeddingClient,
        llm: &dyn LlmClient,
        cancellation: &CancellationToken,
    ) -> Result<IngestionResult, EngineError> {
        let mut result = IngestionResult::default();
        let mut trace = Trace::new();

        let chunk_start = Utc::now();
        let chunk_guard = trace.start(SpanKind::Chunk, chunk_start);
        let chunks = self.chunker.chunk(text);
        let mut chunk_guard = chunk_guard;
        chunk_guard.counter("chunks", chunks.len() as u64);
        trace.record(chunk_guard.finish_ok(Utc::now()));

        // Phase 2: per-chunk extraction + a single embedding batch call.
        let mut chunk_entities: Vec<Vec<ExtractedEntity>> = Vec::with_capacity(chunks.len());
        let mut chunk_triplets: Vec<Vec<ExtractedTriplet>> = Vec::with_capacity(chunks.len());

        for (index, chunk) in chunks.iter().enumerate() {
            cancellation.check()?;
            let extract_start = Utc::now();
            let mut extract_guard = trace.start(SpanKind::Extract, extract_start);

            let response = llm
                .complete_with_schema(chunk, SchemaTarget::Combined)
                .await;
            match response {
                Ok(value) => match normalize_extraction_response(&value.to_string()) {
                    Ok(extraction) => {
                        extract_guard.counter("entities", extraction.entities.len() as u64);
                        extract_guard.counter("triplets", extraction.triplets.len() as u64);
                        trace.record(extract_guard.finish_ok(Utc::now()));
                        chunk_entities.push(extraction.entities);
                        chunk_triplets.push(extraction.triplets);
                        result.chunks_processed += 1;
                    }
                    Err(e) => {
                        trace.record(extract_guard.finish_err(Utc::now(), &e));
                        result.chunks_failed += 1;
                        result
                            .errors
                            .push(IngestionError::new("extract", e.to_string()).with_chunk(index));
                        chunk_entities.push(Vec::new());
                        chunk_triplets.push(Vec::new());
                    }
                },
                Err(e) => {
                    trace.record(extract_guard.finish_err(Utc::now(), &e));
                    result.chunks_failed += 1;
                    result
                        .errors
                        .push(IngestionError::new("extract", e.to_string()).with_chunk(index));
                    chunk_entities.push(Vec::new());
                    chunk_triplets.push(Vec::new());
                }
            }
        }

        let mut embedding_texts = Vec::new();
        for entities in &chunk_entities {
            for entity in entities {
                embedding_texts.push(format!("{} {}", entity.name, entity.description));
            }
        }

        let embed_start = Utc::now();
        let mut embed_guard = trace.start(SpanKind::Embed, embed_start);
        let mut embeddings = Vec::with_capacity(embedding_texts.len());
        let mut embedding_failed = false;
        for batch in sub_batches(&embedding_texts) {
            cancellation.check()?;
            match embedder.embed(batch).await {
                Ok(vectors) => embeddings.extend(vectors),
                Err(e) => {
                    embed_guard.counter("failed_batch_size", batch.len() as u64);
                    trace.record(embed_guard.finish_err(Utc::now(), &e));
                    result
                        .errors
                        .push(IngestionError::new("embed", e.to_string()));
                    embedding_failed = true;
                    break;
                }
            }
        }
        if !embedding_failed {
            embed_guard.counter("vectors", embeddings.len() as u64);
            trace.record(embed_guard.finish_ok(Utc::now()));
        }

        // Phase 3: write graph/vector/provenance rows and mark complete, all
        // inside one transaction (§4.4 step 3) — a failure partway through
        // rolls every node/edge/link/mark-complete back together, leaving
        // the memory row `pending` for a retry (§7). The vector store sits
        // outside the SQL transaction (a separate store, §4.2), so vector
        // upserts are applied only once the transaction has committed.
        let write_start = Utc::now();
        let mut write_guard = trace.start(SpanKind::WriteGraph, write_start);
        let now = Utc::now();
        let mut vector_writes: Vec<(String, Vec<f32>)> = Vec::new();

        self.graph.with_transaction::<(), EngineError>(|conn| {
            let mut embedding_cursor = 0usize;

            for (chunk_index, entities) in chunk_entities.iter().enumerate() {
                cancellation.check()?;
                let entity_map = EntityMap::build(entities);

                for entity in entities {
                    let (node_type, recognised) = NodeType::parse_name(&entity.node_type);
                    if !recognised {
                        tracing::warn!(type = %entity.node_type, "unrecognised node type, defaulting to Concept");
                    }
                    let node_id =
                        ids::generate_deterministic_node_id(&entity.name, node_type.as_str());
                    let embedding = if embedding_failed {
                        None
                    } else {
                        embeddings.get(embedding_cursor).cloned()
                    };
                    embedding_cursor += 1;

                    let mut node = Node::new(
                        node_id.clone(),
                        entity.name.clone(),
                        node_type,
                        entity.description.clone(),
                    );
                    node.embedding = embedding.clone();

                    GraphStore::add_node_stmt(conn, &node)?;
                    if let Some(vec) = embedding {
                        vector_writes.push((node_id.clone(), vec));
                    }
                    MemoryStore::link_node_stmt(conn, memory_id, &node_id, now)?;
                    result.nodes_created += 1;
                }

                for triplet in &chunk_triplets[chunk_index] {
                    let source_id = entity_map.resolve(&triplet.subject);
                    let target_id = entity_map.resolve(&triplet.object);
                    match (source_id, target_id) {
                        (Some(source_id), Some(target_id)) => {
                            let relation = crate::model::normalize_relation(&triplet.relation);
                            let edge_id = ids::generate_deterministic_edge_id(
                                &source_id, &relation, &target_id,
                            );
                            let edge = crate::model::Edge::new(
                                edge_id.clone(),
                                source_id,
                                target_id,
                                relation,
                            );
                            GraphStore::add_edge_stmt(conn, &edge)?;
                            MemoryStore::link_edge_stmt(conn, memory_id, &edge_id, now)?;
                            result.edges_created += 1;
                        }
                        _ => {
                            result.edges_skipped += 1;
                            result.errors.push(IngestionError::new(
                                "edge",
                                format!(
                                    "could not resolve endpoints for triplet {} -{}-> {}",
                                    triplet.subject, triplet.relation, triplet.object
                                ),
                            ).with_chunk(chunk_index));
                        }
                    }
                }
            }

            MemoryStore::mark_complete_stmt(conn, memory_id, Utc::now())?;
            Ok(())
        })?;

        for (node_id, vec) in &vector_writes {
            self.vectors.upsert(node_id, vec)?;
        }

        write_guard.counter("nodes", result.nodes_created);
        write_guard.counter("edges", result.edges_created);
        trace.record(write_guard.finish_ok(Utc::now()));

        result.trace = Some(trace);
        Ok(result)
    }
}
