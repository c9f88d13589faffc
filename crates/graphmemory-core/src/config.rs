//! Engine configuration (§6.6).
//!
//! `Config` is the sole input to `Engine::new`. Validation happens before
//! any I/O so configuration mistakes surface the same way per-call
//! validation errors do (§7).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Basis used to compute a decayed result's age (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecayBasis {
    /// `now - last_accessed_at` when present, else falls back to `created_at`.
    Access,
    /// Always `now - created_at`.
    Creation,
}

impl Default for DecayBasis {
    fn default() -> Self {
        DecayBasis::Access
    }
}

/// Decay decorator configuration (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecayConfig {
    /// Whether the decay decorator is active at all. Default ON, matching
    /// this lineage's documented default-on-after-v1.5.1 behaviour.
    pub enabled: bool,
    pub half_life_days: f64,
    pub basis: DecayBasis,
    pub heat_multiplier_enabled: bool,
    /// Reference access count for the heat multiplier's log normalisation.
    pub heat_reference_count: u32,
    /// Scores below this threshold are filtered from results.
    pub minimum_score: f64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            half_life_days: 30.0,
            basis: DecayBasis::Access,
            heat_multiplier_enabled: true,
            heat_reference_count: 10,
            minimum_score: 0.001,
        }
    }
}

/// Chunker configuration (§6.1). The shipped reference chunker uses a
/// word-count heuristic rather than a real tokenizer; the configuration
/// shape is tokenizer-agnostic so a host can swap in a real `Chunker`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            overlap_tokens: 50,
        }
    }
}

/// Search defaults (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub default_top_k: usize,
    pub max_top_k: usize,
    pub default_graph_depth: usize,
    pub default_include_memory_ids: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: 10,
            max_top_k: 200,
            default_graph_depth: 1,
            default_include_memory_ids: true,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the SQLite database file. `None` or a path equal to
    /// `":memory:"` selects ephemeral mode (§6.4).
    pub db_path: Option<PathBuf>,
    /// Fixed embedding dimensionality for this engine instance (§3).
    pub embedding_dimensions: usize,
    pub decay: DecayConfig,
    pub chunker: ChunkerConfig,
    pub search: SearchConfig,
    /// Default retention policy assigned to memories that don't specify one.
    pub default_retention_policy: crate::model::memory::RetentionPolicy,
    /// Embedding batch sub-batch size guard-rail (§4.4 Phase 2).
    pub embedding_batch_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: None,
            embedding_dimensions: 256,
            decay: DecayConfig::default(),
            chunker: ChunkerConfig::default(),
            search: SearchConfig::default(),
            default_retention_policy: crate::model::memory::RetentionPolicy::Standard,
            embedding_batch_size: 128,
        }
    }
}

impl Config {
    /// Validate configuration before any I/O is attempted (§6.6).
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.embedding_dimensions == 0 {
            return Err(EngineError::Validation(
                "embedding_dimensions must be > 0".into(),
            ));
        }
        if self.decay.half_life_days.is_nan() {
            return Err(EngineError::Validation(
                "decay.half_life_days must not be NaN".into(),
            ));
        }
        if self.search.default_top_k == 0 {
            return Err(EngineError::Validation(
                "search.default_top_k must be > 0".into(),
            ));
        }
        if self.search.max_top_k < self.search.default_top_k {
            return Err(EngineError::Validation(
                "search.max_top_k must be >= search.default_top_k".into(),
            ));
        }
        if self.embedding_batch_size == 0 {
            return Err(EngineError::Validation(
                "embedding_batch_size must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Whether this configuration selects ephemeral (in-memory) storage.
    pub fn is_ephemeral(&self) -> bool {
        match &self.db_path {
            None => true,
            Some(p) => p.to_str() == Some(":memory:"),
        }
    }
}
