//! Isolated `Engine` instances for the scenario suite. Grounded on the
//! core crate's own `engine()` test helper pattern: ephemeral storage,
//! decay disabled by default so scenarios can opt it in explicitly.

use graphmemory_core::{CancellationToken, Config, Engine};

/// Builds an ephemeral engine with decay off and an 8-dimensional
/// embedding space, matching the fakes' fixed-width vectors.
pub fn test_engine() -> Engine {
    let mut config = Config::default();
    config.embedding_dimensions = 8;
    config.decay.enabled = false;
    Engine::new(config).expect("engine should start with a valid ephemeral config")
}

/// Builds an ephemeral engine with decay enabled, for scenarios that
/// exercise recency ranking or decay-driven pruning.
pub fn test_engine_with_decay(half_life_days: f64) -> Engine {
    let mut config = Config::default();
    config.embedding_dimensions = 8;
    config.decay.enabled = true;
    config.decay.half_life_days = half_life_days;
    Engine::new(config).expect("engine should start with a valid ephemeral config")
}

pub fn cancellation() -> CancellationToken {
    CancellationToken::new()
}
