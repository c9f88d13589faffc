//! In-memory vector store (§4.2): used when the engine is opened against
//! `:memory:`, or by hosts that don't need persistence across restarts.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::VectorStoreError;

use super::{cosine_similarity, VectorMatch, VectorStore};

/// Linear cosine-similarity scan over a `HashMap<String, Vec<f32>>`.
/// Fine for the thousands-of-vectors scale this engine targets without the
/// `vector-search` feature; not an ANN index.
pub struct InMemoryVectorStore {
    vectors: RwLock<HashMap<String, Vec<f32>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            vectors: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VectorStore for InMemoryVectorStore {
    fn upsert(&self, key: &str, embedding: &[f32]) -> Result<(), VectorStoreError> {
        let mut guard = self.vectors.write().expect("vector store lock poisoned");
        guard.insert(key.to_string(), embedding.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), VectorStoreError> {
        let mut guard = self.vectors.write().expect("vector store lock poisoned");
        guard.remove(key);
        Ok(())
    }

    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<VectorMatch>, VectorStoreError> {
        let guard = self.vectors.read().expect("vector store lock poisoned");
        let mut scored: Vec<VectorMatch> = guard
            .iter()
            .map(|(key, vec)| VectorMatch {
                key: key.clone(),
                score: cosine_similarity(query, vec),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    fn len(&self) -> usize {
        self.vectors.read().expect("vector store lock poisoned").len()
    }
}
