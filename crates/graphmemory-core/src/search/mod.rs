//! Search engine (§4.5): vector, graph, and hybrid modes behind one
//! `SearchEngine` trait, plus the decay decorator (§4.6).

mod decay;
mod engine;

pub use decay::DecayingSearchEngine;
pub(crate) use decay::{age_days, has_protective_provenance, heat_multiplier, time_factor};
pub use engine::{BaseSearchEngine, SearchHit, SearchMode, SearchOptions, SearchResponse};

use crate::embeddings::EmbeddingClient;
use crate::error::SearchError;

/// One contract `Search(query, options) -> SearchResponse`, implemented by
/// the base engine and wrapped by the decay decorator — both sides of the
/// decorator share this trait so callers can hold `Arc<dyn SearchEngine>`
/// without call-site changes (§9). Embedding the query is part of the
/// contract (§4.5 "Embed query... VectorStore.Search..."), not a step the
/// caller performs beforehand — `embedder` is unused for `SearchMode::Graph`,
/// which never needs a query vector.
#[async_trait::async_trait]
pub trait SearchEngine: Send + Sync {
    async fn search(
        &self,
        query: &str,
        embedder: &dyn EmbeddingClient,
        options: &SearchOptions,
    ) -> Result<SearchResponse, SearchError>;
}
