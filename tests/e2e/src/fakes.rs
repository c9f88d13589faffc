//! Deterministic `EmbeddingClient`/`LlmClient` stand-ins for the scenario
//! suite. Grounded on the core crate's own `#[cfg(test)]` fakes
//! (`embeddings::fakes::FakeEmbeddingClient`, `llm::fakes::FakeLlmClient`),
//! reimplemented here because those are private to that crate.

use std::collections::HashMap;
use std::sync::Mutex;

use graphmemory_core::{EmbeddingClientError, LlmClientError, SchemaTarget};

/// Hashes each word into a fixed-width vector so identical text always
/// embeds to the same point and near-identical text embeds nearby, unless
/// `overrides` pins a specific text to a specific vector (for tests that
/// need an exact query/node embedding match).
pub struct WordHashEmbeddingClient {
    pub dimensions: usize,
    pub overrides: HashMap<String, Vec<f32>>,
}

impl WordHashEmbeddingClient {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            overrides: HashMap::new(),
        }
    }

    pub fn with_override(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.overrides.insert(text.to_string(), vector);
        self
    }
}

#[async_trait::async_trait]
impl graphmemory_core::EmbeddingClient for WordHashEmbeddingClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        Ok(texts
            .iter()
            .map(|text| {
                if let Some(vector) = self.overrides.get(text) {
                    return vector.clone();
                }
                let mut vector = vec![0.0f32; self.dimensions];
                for (i, byte) in text.bytes().enumerate() {
                    vector[i % self.dimensions] += byte as f32;
                }
                vector
            })
            .collect())
    }
}

/// Returns one queued extraction response per call, in order. Each
/// scenario scripts exactly one response per chunk it expects to be
/// extracted (the default chunker yields one chunk per short document).
pub struct ScriptedLlmClient {
    responses: Mutex<Vec<serde_json::Value>>,
}

impl ScriptedLlmClient {
    pub fn new(responses: Vec<serde_json::Value>) -> Self {
        Self {
            responses: Mutex::new(responses),
        }
    }
}

#[async_trait::async_trait]
impl graphmemory_core::LlmClient for ScriptedLlmClient {
    async fn complete_with_schema(
        &self,
        _prompt: &str,
        _target: SchemaTarget,
    ) -> Result<serde_json::Value, LlmClientError> {
        let mut responses = self.responses.lock().unwrap();
        assert!(!responses.is_empty(), "no scripted responses left");
        Ok(responses.remove(0))
    }
}
