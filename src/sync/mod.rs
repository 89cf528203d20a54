//! Refresh-cycle machinery: batch cursor and orchestrator

pub mod cursor;
pub mod orchestrator;

// Re-export main types for cleaner imports
pub use cursor::{BatchCursor, WalkStats};
pub use orchestrator::{CycleReport, SyncOrchestrator};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative stop flag, checked between account attempts and between
/// batches. Clones share the underlying flag.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
