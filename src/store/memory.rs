//! In-process backend for tests and ephemeral runs.

use super::{Snapshot, StoreBackend, StoreError};
use async_trait::async_trait;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    saved: Option<Snapshot>,
    save_count: usize,
    fail_saves: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already persisted snapshot.
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                saved: Some(snapshot),
                ..Default::default()
            }),
        }
    }

    /// Make subsequent saves fail with [`StoreError::Unavailable`].
    pub async fn set_fail_saves(&self, fail: bool) {
        self.state.lock().await.fail_saves = fail;
    }

    pub async fn saved(&self) -> Option<Snapshot> {
        self.state.lock().await.saved.clone()
    }

    /// Number of successful saves.
    pub async fn save_count(&self) -> usize {
        self.state.lock().await.save_count
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn load(&self) -> Result<Option<Snapshot>, StoreError> {
        Ok(self.state.lock().await.saved.clone())
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.fail_saves {
            return Err(StoreError::Unavailable("memory backend set to fail".to_string()));
        }
        state.saved = Some(snapshot.clone());
        state.save_count += 1;
        Ok(())
    }
}
