//! ==============================================================================
//! store.rs - the reading store
//! ==============================================================================
//!
//! purpose:
//!     holds the one current SensorSnapshot for the lifetime of the process.
//!     sensor nodes merge partial updates into it, the poller reads it back.
//!
//! concurrency:
//!     axum handlers run on a multi-threaded runtime, so the snapshot sits
//!     behind arc<rwlock<>>. a merge happens entirely under the write guard,
//!     so a reader never sees half an update.
//!
//! relationships:
//!     - used by: server.rs (injected as axum state)
//!     - uses: domain.rs (SensorSnapshot, SensorUpdate)
//!
//! ==============================================================================

use crate::domain::{SensorSnapshot, SensorUpdate};
use std::sync::Arc;
use tokio::sync::RwLock;

/// clone-able handle to the shared snapshot
#[derive(Clone)]
pub struct ReadingStore {
    current: Arc<RwLock<SensorSnapshot>>,
}

impl ReadingStore {
    pub fn new(initial: SensorSnapshot) -> Self {
        Self {
            current: Arc::new(RwLock::new(initial)),
        }
    }

    /// merge measured fields into the current snapshot and return the result
    pub async fn update(&self, update: &SensorUpdate) -> SensorSnapshot {
        let mut guard = self.current.write().await;
        guard.apply(update);
        *guard
    }

    pub async fn get_current(&self) -> SensorSnapshot {
        *self.current.read().await
    }
}

impl Default for ReadingStore {
    fn default() -> Self {
        Self::new(SensorSnapshot::PLACEHOLDER)
    }
}
