//! Lifecycle maintenance (§4.6): pruning of aged/superseded memories and
//! their orphaned graph provenance.

mod prune;

pub use prune::{prune, PruneOptions, PruneResult};
