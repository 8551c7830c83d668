//! Checkpoint manager — persists the ingestion cursor for crash recovery.
//!
//! A checkpoint stores the next unused row id and the last fully processed
//! block. Rows and checkpoint are written together in one commit, so after a
//! restart the pipeline resumes exactly where the last durable batch ended.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::IndexerError;
use crate::rows::RowBatch;
use crate::types::{BlockId, Row};

/// The persisted ingestion cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Id the next persisted row will receive.
    pub next_row_id: u64,
    /// Last block whose rows are durably stored.
    pub last_block: BlockId,
}

impl Checkpoint {
    pub fn new(next_row_id: u64, last_block: BlockId) -> Self {
        Self {
            next_row_id,
            last_block,
        }
    }
}

/// Trait for durable row + checkpoint storage.
///
/// Implementations include `MemoryCheckpointStore` and `SqliteStorage`.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the saved checkpoint (`None` on first run).
    async fn load(&self) -> Result<Option<Checkpoint>, IndexerError>;

    /// Append `rows` and overwrite the checkpoint as one atomic unit.
    ///
    /// On error nothing from this call may be visible to a later `load`.
    async fn commit(&self, rows: &[Row], checkpoint: &Checkpoint) -> Result<(), IndexerError>;
}

#[async_trait]
impl<S: CheckpointStore + ?Sized> CheckpointStore for std::sync::Arc<S> {
    async fn load(&self) -> Result<Option<Checkpoint>, IndexerError> {
        (**self).load().await
    }

    async fn commit(&self, rows: &[Row], checkpoint: &Checkpoint) -> Result<(), IndexerError> {
        (**self).commit(rows, checkpoint).await
    }
}

/// Owns the in-memory cursor and the store it mirrors.
pub struct CheckpointManager {
    store: Box<dyn CheckpointStore>,
    current: Option<Checkpoint>,
}

impl CheckpointManager {
    pub fn new(store: Box<dyn CheckpointStore>) -> Self {
        Self {
            store,
            current: None,
        }
    }

    /// Load the saved checkpoint, or start at `{0, chain_height}` on an empty store.
    pub async fn resume(&mut self, chain_height: BlockId) -> Result<Checkpoint, IndexerError> {
        let cp = match self.store.load().await? {
            Some(cp) => {
                tracing::info!(
                    next_row_id = cp.next_row_id,
                    last_block = cp.last_block,
                    "Resuming from checkpoint"
                );
                cp
            }
            None => {
                tracing::info!(chain_height, "No checkpoint found, starting at chain height");
                Checkpoint::new(0, chain_height)
            }
        };
        self.current = Some(cp);
        Ok(cp)
    }

    /// Re-read the store and adopt its checkpoint, if it has one.
    ///
    /// Used after a failed commit: the write may have landed anyway, or
    /// another writer may have advanced the store.
    pub async fn reload(&mut self) -> Result<Option<Checkpoint>, IndexerError> {
        if let Some(cp) = self.store.load().await? {
            if self.current != Some(cp) {
                tracing::warn!(
                    next_row_id = cp.next_row_id,
                    last_block = cp.last_block,
                    "Store checkpoint differs from cursor, adopting it"
                );
            }
            self.current = Some(cp);
        }
        Ok(self.current)
    }

    /// The in-memory cursor, if `resume` has run.
    pub fn current(&self) -> Option<Checkpoint> {
        self.current
    }

    /// Durably commit a batch, advancing the cursor only on success.
    pub async fn commit(&mut self, batch: &RowBatch) -> Result<Checkpoint, IndexerError> {
        self.store.commit(&batch.rows, &batch.checkpoint).await?;
        self.current = Some(batch.checkpoint);
        Ok(batch.checkpoint)
    }
}

// ─── In-memory store (for testing) ────────────────────────────────────────────

use std::sync::Mutex;

#[derive(Default)]
struct MemoryState {
    rows: Vec<Row>,
    checkpoint: Option<Checkpoint>,
}

/// In-memory store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    state: Mutex<MemoryState>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every committed row.
    pub fn rows(&self) -> Vec<Row> {
        self.state.lock().unwrap().rows.clone()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self) -> Result<Option<Checkpoint>, IndexerError> {
        Ok(self.state.lock().unwrap().checkpoint)
    }

    async fn commit(&self, rows: &[Row], checkpoint: &Checkpoint) -> Result<(), IndexerError> {
        let mut state = self.state.lock().unwrap();
        let expected = state.checkpoint.map(|cp| cp.next_row_id).unwrap_or(0);
        if let Some(first) = rows.first() {
            if first.id != expected {
                return Err(IndexerError::CheckpointMismatch {
                    expected,
                    actual: first.id,
                });
            }
        }
        state.rows.extend_from_slice(rows);
        state.checkpoint = Some(*checkpoint);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RowPayload;

    fn sentinel(id: u64, block_id: BlockId) -> Row {
        Row {
            id,
            block_id,
            payload: RowPayload::Sentinel,
        }
    }

    struct FailingStore;

    #[async_trait]
    impl CheckpointStore for FailingStore {
        async fn load(&self) -> Result<Option<Checkpoint>, IndexerError> {
            Ok(Some(Checkpoint::new(7, 70)))
        }

        async fn commit(&self, _rows: &[Row], _cp: &Checkpoint) -> Result<(), IndexerError> {
            Err(IndexerError::Storage("disk full".into()))
        }
    }

    #[tokio::test]
    async fn resume_defaults_to_chain_height() {
        let mut mgr = CheckpointManager::new(Box::new(MemoryCheckpointStore::new()));
        assert!(mgr.current().is_none());

        let cp = mgr.resume(1_000).await.unwrap();
        assert_eq!(cp, Checkpoint::new(0, 1_000));
        assert_eq!(mgr.current(), Some(cp));
    }

    #[tokio::test]
    async fn commit_then_resume() {
        let store = MemoryCheckpointStore::new();
        store
            .commit(&[sentinel(0, 11)], &Checkpoint::new(1, 11))
            .await
            .unwrap();

        let mut mgr = CheckpointManager::new(Box::new(store));
        let cp = mgr.resume(999).await.unwrap();
        assert_eq!(cp, Checkpoint::new(1, 11));
    }

    #[tokio::test]
    async fn failed_commit_keeps_cursor() {
        let mut mgr = CheckpointManager::new(Box::new(FailingStore));
        let before = mgr.resume(0).await.unwrap();

        let batch = RowBatch {
            rows: vec![sentinel(7, 71)],
            checkpoint: Checkpoint::new(8, 71),
        };
        let err = mgr.commit(&batch).await.unwrap_err();
        assert!(err.is_persistence());
        assert_eq!(mgr.current(), Some(before));
    }

    #[tokio::test]
    async fn reload_adopts_store_checkpoint() {
        let store = std::sync::Arc::new(MemoryCheckpointStore::new());
        let mut mgr = CheckpointManager::new(Box::new(store.clone()));
        mgr.resume(0).await.unwrap();

        store
            .commit(&[sentinel(0, 4)], &Checkpoint::new(1, 4))
            .await
            .unwrap();
        assert_eq!(mgr.current(), Some(Checkpoint::new(0, 0)));
        assert_eq!(mgr.reload().await.unwrap(), Some(Checkpoint::new(1, 4)));
        assert_eq!(mgr.current(), Some(Checkpoint::new(1, 4)));
    }

    #[tokio::test]
    async fn reload_keeps_cursor_on_empty_store() {
        let mut mgr = CheckpointManager::new(Box::new(MemoryCheckpointStore::new()));
        mgr.resume(9).await.unwrap();
        assert_eq!(mgr.reload().await.unwrap(), Some(Checkpoint::new(0, 9)));
    }

    #[tokio::test]
    async fn memory_store_rejects_id_gap() {
        let store = MemoryCheckpointStore::new();
        let err = store
            .commit(&[sentinel(3, 11)], &Checkpoint::new(4, 11))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IndexerError::CheckpointMismatch { expected: 0, actual: 3 }
        ));
        assert!(store.load().await.unwrap().is_none());
        assert!(store.rows().is_empty());
    }
}
