//! Cooperative cancellation (§5, §9).
//!
//! A minimal `Arc<AtomicBool>`-backed token, shaped like
//! `tokio_util::sync::CancellationToken` but local to this crate since it
//! is the only such primitive needed. Every public `Engine` method accepts
//! one and checks it at each I/O boundary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::EngineError;

/// A cheap, cloneable cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns `Err(EngineError::Cancelled)` if the token has been tripped.
    /// Call at every I/O boundary (§5).
    pub fn check(&self) -> Result<(), EngineError> {
        if self.is_cancelled() {
            Err(EngineError::Cancelled)
        } else {
            Ok(())
        }
    }
}
