//! Local, deterministic stand-ins for the `EmbeddingClient`/`LlmClient`
//! traits so the CLI has something to call against without a network
//! dependency. These are demo-only — a real deployment supplies its own
//! embedding model and LLM client (the core crate ships no such
//! implementation, by design).

use async_trait::async_trait;
use graphmemory_core::{
    EmbeddingClientError, ExtractedEntity, ExtractedTriplet, LlmClientError, SchemaTarget,
};
use sha2::{Digest, Sha256};

/// Hashes each input into a fixed-width vector so the same text always
/// embeds to the same point, without depending on a real model.
pub struct HashEmbeddingClient {
    dimensions: usize,
}

impl HashEmbeddingClient {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

#[async_trait]
impl graphmemory_core::EmbeddingClient for HashEmbeddingClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0f32; self.dimensions];
                let digest = Sha256::digest(text.as_bytes());
                for (i, byte) in digest.iter().enumerate() {
                    vector[i % self.dimensions] += *byte as f32;
                }
                vector
            })
            .collect())
    }
}

/// Extracts a single `Concept` entity from the whole chunk text (clipped to
/// 80 characters) and no triplets. Good enough to exercise ingestion
/// end-to-end from the command line without a real LLM.
pub struct NaiveExtractionClient;

#[async_trait]
impl graphmemory_core::LlmClient for NaiveExtractionClient {
    async fn complete_with_schema(
        &self,
        prompt: &str,
        _target: SchemaTarget,
    ) -> Result<serde_json::Value, LlmClientError> {
        let name: String = prompt.chars().take(80).collect();
        let entities = vec![ExtractedEntity {
            name: name.trim().to_string(),
            node_type: "Concept".to_string(),
            description: String::new(),
        }];
        let triplets: Vec<ExtractedTriplet> = Vec::new();
        Ok(serde_json::json!({ "entities": entities, "triplets": triplets }))
    }
}
