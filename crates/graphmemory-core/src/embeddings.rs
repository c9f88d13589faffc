//! Embedding client consumer contract (§6.2).

use crate::error::EmbeddingClientError;

/// Sub-batch guard-rail for `embed` calls made during ingestion (§4.4 Phase 2).
pub const MAX_EMBEDDING_BATCH_SIZE: usize = 128;

/// Produces dense vectors for text. No network-calling implementation
/// ships in this crate (out of scope per §1) — hosts bring their own.
/// Boxed via `async_trait` so the pipeline can hold `&dyn EmbeddingClient`.
#[async_trait::async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError> {
        let mut result = self.embed(std::slice::from_ref(&text.to_string())).await?;
        result.pop().ok_or_else(|| {
            EmbeddingClientError::Request("embedding client returned no vectors".into())
        })
    }
}

/// Split `texts` into chunks of at most `MAX_EMBEDDING_BATCH_SIZE` (§4.4 Phase 2).
pub fn sub_batches(texts: &[String]) -> impl Iterator<Item = &[String]> {
    texts.chunks(MAX_EMBEDDING_BATCH_SIZE)
}
