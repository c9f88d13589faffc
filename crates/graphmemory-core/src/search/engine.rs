//! Base search engine (§4.5): vector, graph, and hybrid modes, grounded on
//! the teacher's `search/hybrid.rs` free-function fusion + config-struct
//! style — kept here, but fusing `vector_score`/`graph_score` instead of
//! keyword/semantic BM25 scores.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::embeddings::EmbeddingClient;
use crate::error::SearchError;
use crate::graph_store::GraphStore;
use crate::memory_store::MemoryStore;
use crate::model::Node;
use crate::trace::{SpanKind, Trace};
use crate::vector_store::VectorStore;

use super::SearchEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Vector,
    Graph,
    Hybrid,
}

/// Options accepted by `Search` (§4.5).
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub mode: SearchMode,
    pub top_k: usize,
    pub graph_depth: usize,
    pub seed_node_ids: Vec<String>,
    pub include_memory_ids: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            mode: SearchMode::Vector,
            top_k: 10,
            graph_depth: 1,
            seed_node_ids: Vec::new(),
            include_memory_ids: true,
        }
    }
}

/// A single search result row (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub node_id: String,
    pub name: String,
    pub score: f64,
    pub source: String,
    pub graph_depth: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub memory_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Trace>,
}

impl SearchResponse {
    /// The deduplicated set of memory ids referenced across all hits, used
    /// by the façade's single post-search `BatchUpdateMemoryAccess` call.
    pub fn memory_ids(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for hit in &self.hits {
            for id in &hit.memory_ids {
                if seen.insert(id.clone()) {
                    out.push(id.clone());
                }
            }
        }
        out
    }
}

/// `graph_score = 1 / (1 + depth)` (§4.5).
fn depth_score(depth: usize) -> f64 {
    1.0 / (1.0 + depth as f64)
}

struct FusedEntry {
    vector_score: f64,
    graph_score: f64,
    graph_depth: usize,
}

/// Fuse vector-search hits and graph-expansion hits by node id, keeping the
/// max of each component score (§4.5 hybrid mode).
fn fuse(
    vector_hits: &[(String, f64)],
    graph_hits: &[(String, usize)],
) -> HashMap<String, FusedEntry> {
    let mut fused: HashMap<String, FusedEntry> = HashMap::new();

    for (id, score) in vector_hits {
        fused
            .entry(id.clone())
            .and_modify(|e| e.vector_score = e.vector_score.max(*score))
            .or_insert(FusedEntry {
                vector_score: *score,
                graph_score: 0.0,
                graph_depth: usize::MAX,
            });
    }

    for (id, depth) in graph_hits {
        let score = depth_score(*depth);
        fused
            .entry(id.clone())
            .and_modify(|e| {
                if score > e.graph_score {
                    e.graph_score = score;
                    e.graph_depth = (*depth).min(e.graph_depth);
                }
            })
            .or_insert(FusedEntry {
                vector_score: 0.0,
                graph_score: score,
                graph_depth: *depth,
            });
    }

    fused
}

fn source_for(entry: &FusedEntry) -> &'static str {
    match (entry.vector_score > 0.0, entry.graph_score > 0.0) {
        (true, true) => "hybrid",
        (true, false) => "vector",
        (false, true) => "graph",
        (false, false) => "vector",
    }
}

/// The base (undecayed) search engine.
pub struct BaseSearchEngine {
    graph: Arc<GraphStore>,
    memory: Arc<MemoryStore>,
    vectors: Arc<dyn VectorStore>,
}

impl BaseSearchEngine {
    pub fn new(graph: Arc<GraphStore>, memory: Arc<MemoryStore>, vectors: Arc<dyn VectorStore>) -> Self {
        Self {
            graph,
            memory,
            vectors,
        }
    }

    fn hydrate(&self, node_id: &str) -> Result<Option<Node>, SearchError> {
        Ok(self.graph.get_node(node_id)?)
    }

    fn attach_memory_ids(
        &self,
        hits: &mut [SearchHit],
        include_memory_ids: bool,
    ) -> Result<(), SearchError> {
        if !include_memory_ids || hits.is_empty() {
            return Ok(());
        }
        let ids: Vec<String> = hits.iter().map(|h| h.node_id.clone()).collect();
        let by_node = self.memory.get_memories_by_node_ids(&ids)?;
        for hit in hits.iter_mut() {
            if let Some(memory_ids) = by_node.get(&hit.node_id) {
                hit.memory_ids = memory_ids.clone();
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl SearchEngine for BaseSearchEngine {
    async fn search(
        &self,
        query: &str,
        embedder: &dyn EmbeddingClient,
        options: &SearchOptions,
    ) -> Result<SearchResponse, SearchError> {
        let mut trace = Trace::new();
        let now = chrono::Utc::now();

        let mut hits = match options.mode {
            SearchMode::Vector => {
                let query_embedding = embedder.embed_one(query).await?;
                let mut guard = trace.start(SpanKind::SearchVector, now);
                let matches = self.vectors.search(&query_embedding, options.top_k)?;
                guard.counter("matches", matches.len() as u64);
                trace.record(guard.finish_ok(chrono::Utc::now()));

                let mut hits = Vec::with_capacity(matches.len());
                for m in matches {
                    if let Some(node) = self.hydrate(&m.key)? {
                        hits.push(SearchHit {
                            node_id: node.id,
                            name: node.name,
                            score: m.score,
                            source: "vector".to_string(),
                            graph_depth: 0,
                            memory_ids: Vec::new(),
                        });
                    }
                }
                hits
            }
            SearchMode::Graph => {
                if options.seed_node_ids.is_empty() {
                    return Err(SearchError::MissingSeeds);
                }
                let mut guard = trace.start(SpanKind::SearchExpand, now);
                let mut best: HashMap<String, usize> = HashMap::new();
                for seed in &options.seed_node_ids {
                    best.entry(seed.clone()).or_insert(0);
                    for (id, depth) in self.graph.get_neighbors(seed, options.graph_depth)? {
                        best.entry(id).and_modify(|d| *d = (*d).min(depth)).or_insert(depth);
                    }
                }
                guard.counter("nodes", best.len() as u64);
                trace.record(guard.finish_ok(chrono::Utc::now()));

                let mut hits = Vec::with_capacity(best.len());
                for (id, depth) in best {
                    if let Some(node) = self.hydrate(&id)? {
                        hits.push(SearchHit {
                            node_id: node.id,
                            name: node.name,
                            score: depth_score(depth),
                            source: "graph".to_string(),
                            graph_depth: depth,
                            memory_ids: Vec::new(),
                        });
                    }
                }
                hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
                hits.truncate(options.top_k);
                hits
            }
            SearchMode::Hybrid => {
                let seed_k = (options.top_k * 2).max(20);
                let query_embedding = embedder.embed_one(query).await?;

                let mut vec_guard = trace.start(SpanKind::SearchVector, now);
                let matches = self.vectors.search(&query_embedding, seed_k)?;
                vec_guard.counter("matches", matches.len() as u64);
                trace.record(vec_guard.finish_ok(chrono::Utc::now()));

                let vector_hits: Vec<(String, f64)> =
                    matches.iter().map(|m| (m.key.clone(), m.score)).collect();

                let expand_start = chrono::Utc::now();
                let mut expand_guard = trace.start(SpanKind::SearchExpand, expand_start);
                let mut graph_hits: Vec<(String, usize)> = Vec::new();
                for (id, _) in &vector_hits {
                    graph_hits.push((id.clone(), 0));
                    for (neighbor, depth) in self.graph.get_neighbors(id, options.graph_depth)? {
                        graph_hits.push((neighbor, depth));
                    }
                }
                expand_guard.counter("expanded", graph_hits.len() as u64);
                trace.record(expand_guard.finish_ok(chrono::Utc::now()));

                let fused = fuse(&vector_hits, &graph_hits);
                let mut hits = Vec::with_capacity(fused.len());
                for (id, entry) in fused {
                    if let Some(node) = self.hydrate(&id)? {
                        hits.push(SearchHit {
                            node_id: node.id,
                            name: node.name,
                            score: entry.vector_score + entry.graph_score,
                            source: source_for(&entry).to_string(),
                            graph_depth: if entry.graph_depth == usize::MAX {
                                0
                            } else {
                                entry.graph_depth
                            },
                            memory_ids: Vec::new(),
                        });
                    }
                }
                hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
                hits.truncate(options.top_k);
                hits
            }
        };

        self.attach_memory_ids(&mut hits, options.include_memory_ids)?;

        Ok(SearchResponse {
            hits,
            trace: Some(trace),
        })
    }
}
