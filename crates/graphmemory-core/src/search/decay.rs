//! Decay decorator (§4.6): wraps a base [`SearchEngine`], re-scoring each
//! hit by recency and access heat before re-sorting and filtering.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::{DecayBasis, DecayConfig};
use crate::embeddings::EmbeddingClient;
use crate::error::SearchError;
use crate::graph_store::GraphStore;
use crate::memory_store::MemoryStore;
use crate::model::{MemoryRecord, RetentionPolicy};

use super::{SearchEngine, SearchHit, SearchOptions, SearchResponse};

/// `0.5^(age_days / half_life_days)`; a non-positive half-life collapses
/// to a factor of 1 rather than dividing by zero (§4.6).
pub(crate) fn time_factor(age_days: f64, half_life_days: f64) -> f64 {
    if half_life_days <= 0.0 {
        return 1.0;
    }
    0.5f64.powf(age_days / half_life_days)
}

/// `min(1.0, log(access_count + 1) / log(reference_count + 1))` (§4.6).
pub(crate) fn heat_multiplier(access_count: u64, reference_count: u32) -> f64 {
    let numerator = ((access_count + 1) as f64).ln();
    let denominator = ((reference_count as u64 + 1) as f64).ln();
    if denominator <= 0.0 {
        return 1.0;
    }
    (numerator / denominator).min(1.0)
}

pub(crate) fn age_days(now: DateTime<Utc>, basis: DateTime<Utc>) -> f64 {
    (now - basis).num_seconds() as f64 / 86_400.0
}

/// Whether any memory in `memories` grants this node an unconditional
/// time factor of 1 — `permanent` retention or pinned (§4.6).
pub(crate) fn has_protective_provenance(memories: &[MemoryRecord]) -> bool {
    memories
        .iter()
        .any(|m| m.pinned || m.retention_policy == RetentionPolicy::Permanent)
}

/// Wraps a base [`SearchEngine`], applying the spec's decay formula to
/// each hit after the base search returns (§4.6). Implements the same
/// trait as the base engine so callers can swap implementations freely.
pub struct DecayingSearchEngine {
    inner: Arc<dyn SearchEngine>,
    graph: Arc<GraphStore>,
    memory: Arc<MemoryStore>,
    config: DecayConfig,
}

impl DecayingSearchEngine {
    pub fn new(
        inner: Arc<dyn SearchEngine>,
        graph: Arc<GraphStore>,
        memory: Arc<MemoryStore>,
        config: DecayConfig,
    ) -> Self {
        Self {
            inner,
            graph,
            memory,
            config,
        }
    }

    fn decayed_score(&self, hit: &SearchHit, now: DateTime<Utc>) -> Result<Option<f64>, SearchError> {
        let node = match self.graph.get_node(&hit.node_id)? {
            Some(n) => n,
            None => return Ok(None),
        };

        let memory_ids = self.memory.get_memories_by_node_ids(std::slice::from_ref(&hit.node_id))?;
        let linked_ids = memory_ids.get(&hit.node_id).cloned().unwrap_or_default();
        let mut memories = Vec::with_capacity(linked_ids.len());
        for id in &linked_ids {
            if let Some(m) = self.memory.get_memory(id)? {
                memories.push(m);
            }
        }

        if has_protective_provenance(&memories) {
            let heat = if self.config.heat_multiplier_enabled {
                heat_multiplier(node.access_count, self.config.heat_reference_count)
            } else {
                1.0
            };
            let blended = hit.score * 1.0 * (0.5 + 0.5 * heat);
            return Ok(Some(blended));
        }

        let basis = match self.config.basis {
            DecayBasis::Access => node.last_accessed_at.unwrap_or(node.created_at),
            DecayBasis::Creation => node.created_at,
        };
        let factor = time_factor(age_days(now, basis), self.config.half_life_days);

        let heat = if self.config.heat_multiplier_enabled {
            heat_multiplier(node.access_count, self.config.heat_reference_count)
        } else {
            1.0
        };

        Ok(Some(hit.score * factor * (0.5 + 0.5 * heat)))
    }
}

#[async_trait::async_trait]
impl SearchEngine for DecayingSearchEngine {
    async fn search(
        &self,
        query: &str,
        embedder: &dyn EmbeddingClient,
        options: &SearchOptions,
    ) -> Result<SearchResponse, SearchError> {
        let mut response = self.inner.search(query, embedder, options).await?;

        if !self.config.enabled {
            return Ok(response);
        }

        let now = Utc::now();
        let mut rescored = Vec::with_capacity(response.hits.len());
        for mut hit in response.hits.drain(..) {
            if let Some(score) = self.decayed_score(&hit, now)? {
                if score >= self.config.minimum_score {
                    hit.score = score;
                    rescored.push(hit);
                }
            }
        }
        rescored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        response.hits = rescored;
        Ok(response)
    }
}
