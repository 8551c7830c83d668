//! The main index loop — one polling cycle at a time.
//!
//! # Cycle
//! 1. List slots after `last_block` (retried until the node answers)
//! 2. Fetch every body in parallel chunks (item-level retry)
//! 3. Restore slot order
//! 4. Decode instructions for the configured program
//! 5. Build rows (one sentinel per empty block) and commit them together
//!    with the new checkpoint
//!
//! The in-memory cursor only moves after step 5 succeeds. After a failed
//! commit the cursor is re-read from the store: if nothing landed the next
//! cycle redoes the same slots with the same row ids, and if the write did
//! land (or another writer moved the store) the loop continues from there.

use std::sync::Arc;

use slotstream_core::checkpoint::{Checkpoint, CheckpointManager, CheckpointStore};
use slotstream_core::client::ChainClient;
use slotstream_core::decoder::BlockDecoder;
use slotstream_core::error::IndexerError;
use slotstream_core::indexer::{IndexerConfig, IndexerState, PersistenceFailurePolicy};
use slotstream_core::rows::build_rows;
use slotstream_core::sequencer::sequence;
use slotstream_core::types::{BlockId, DecodedEvent};

use crate::fetcher::BatchFetcher;
use crate::lister::BlockLister;

/// Result of one polling cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No new slots since the cursor.
    Idle,
    /// A batch was durably committed.
    Committed {
        blocks: usize,
        rows: usize,
        checkpoint: Checkpoint,
    },
}

/// The core index loop implementation.
pub struct IndexLoop<C: ChainClient> {
    config: IndexerConfig,
    lister: BlockLister<C>,
    fetcher: BatchFetcher<C>,
    decoder: BlockDecoder,
    checkpoint: CheckpointManager,
    state: IndexerState,
}

impl<C: ChainClient> IndexLoop<C> {
    pub fn new(
        config: IndexerConfig,
        client: C,
        decoder: BlockDecoder,
        store: Box<dyn CheckpointStore>,
    ) -> Self {
        let client = Arc::new(client);
        let retry = config.retry_policy();
        Self {
            lister: BlockLister::new(Arc::clone(&client), retry.clone()),
            fetcher: BatchFetcher::new(
                client,
                config.batch_limit,
                config.max_parallel_fetchers,
                retry,
            ),
            decoder,
            checkpoint: CheckpointManager::new(store),
            state: IndexerState::Idle,
            config,
        }
    }

    pub fn state(&self) -> IndexerState {
        self.state
    }

    /// The committed cursor, once resumed.
    pub fn checkpoint(&self) -> Option<Checkpoint> {
        self.checkpoint.current()
    }

    /// Mark the loop as stopped after the caller abandoned `run`.
    pub fn stop(&mut self) {
        self.state = IndexerState::Stopped;
    }

    /// Load the saved checkpoint, defaulting to the current chain height.
    pub async fn resume(&mut self) -> Result<Checkpoint, IndexerError> {
        let height = self.lister.current_height().await?;
        self.checkpoint.resume(height).await
    }

    /// Run cycles until an unrecoverable error.
    pub async fn run(&mut self) -> Result<(), IndexerError> {
        self.state = IndexerState::Running;
        if let Err(e) = self.resume().await {
            self.state = IndexerState::Error;
            return Err(e);
        }
        let poll_interval = self.config.poll_interval();

        loop {
            match self.run_cycle().await {
                Ok(CycleOutcome::Idle) => tokio::time::sleep(poll_interval).await,
                // Catching up: go straight to the next cycle.
                Ok(CycleOutcome::Committed { .. }) => {}
                Err(e)
                    if e.is_persistence()
                        && self.config.on_persistence_failure == PersistenceFailurePolicy::Retry =>
                {
                    tracing::warn!(error = %e, "commit failed, retrying cycle from the same cursor");
                    tokio::time::sleep(poll_interval).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "index loop stopped");
                    self.state = IndexerState::Error;
                    return Err(e);
                }
            }
        }
    }

    /// Run a single polling cycle.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, IndexerError> {
        let cursor = match self.checkpoint.current() {
            Some(cp) => cp,
            None => self.resume().await?,
        };

        let ids = self.lister.list_since(cursor.last_block).await?;
        if ids.is_empty() {
            return Ok(CycleOutcome::Idle);
        }

        let bodies = self.fetcher.fetch(&ids).await?;
        let ordered = sequence(&ids, bodies)?;

        let blocks: Vec<(BlockId, Vec<DecodedEvent>)> = ordered
            .iter()
            .map(|(id, body)| (*id, self.decoder.decode_block(body)))
            .collect();
        let events: usize = blocks.iter().map(|(_, ev)| ev.len()).sum();

        let Some(batch) = build_rows(cursor.next_row_id, &blocks) else {
            return Ok(CycleOutcome::Idle);
        };
        let rows = batch.rows.len();
        let checkpoint = match self.checkpoint.commit(&batch).await {
            Ok(cp) => cp,
            Err(e) => {
                if let Err(load_err) = self.checkpoint.reload().await {
                    tracing::warn!(error = %load_err, "could not re-read checkpoint after failed commit");
                }
                return Err(e);
            }
        };

        tracing::info!(
            first_block = ids[0],
            last_block = checkpoint.last_block,
            blocks = ids.len(),
            events,
            rows,
            next_row_id = checkpoint.next_row_id,
            "cycle committed"
        );

        Ok(CycleOutcome::Committed {
            blocks: ids.len(),
            rows,
            checkpoint,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use slotstream_core::checkpoint::MemoryCheckpointStore;
    use slotstream_core::decoder::{DecodeOutcome, InstructionDecoder};
    use slotstream_core::types::{BlockBody, Instruction, ProgramRef, Row, Transaction};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    const PROGRAM: &str = "Prog1111";

    /// Every payload is relevant.
    struct Any;

    impl InstructionDecoder for Any {
        fn decode(&self, payload: &[u8]) -> Result<DecodeOutcome, IndexerError> {
            Ok(DecodeOutcome::Relevant {
                schema: "Any".into(),
                fields_json: serde_json::json!({ "byte": payload[0] }),
            })
        }
    }

    /// Slots 1..=3 exist; slot 2 has one program instruction.
    struct Ledger;

    #[async_trait]
    impl ChainClient for Ledger {
        async fn current_height(&self) -> Result<BlockId, IndexerError> {
            Ok(0)
        }

        async fn list_blocks(&self, since: BlockId) -> Result<Vec<BlockId>, IndexerError> {
            Ok((since..=3).collect())
        }

        async fn fetch_block_bodies(
            &self,
            ids: &[BlockId],
        ) -> Result<HashMap<BlockId, BlockBody>, IndexerError> {
            Ok(ids
                .iter()
                .map(|&id| {
                    let txs = if id == 2 {
                        vec![Transaction {
                            signature: Some("s".into()),
                            accounts: vec![PROGRAM.into()],
                            instructions: vec![Instruction {
                                program: ProgramRef::Index(0),
                                accounts: vec![],
                                payload: vec![9],
                            }],
                        }]
                    } else {
                        vec![]
                    };
                    (id, BlockBody::new(id, txs))
                })
                .collect())
        }
    }

    /// Rejects the first `fail` commits.
    struct Flaky {
        inner: MemoryCheckpointStore,
        fail: AtomicU32,
    }

    #[async_trait]
    impl CheckpointStore for Flaky {
        async fn load(&self) -> Result<Option<Checkpoint>, IndexerError> {
            self.inner.load().await
        }

        async fn commit(&self, rows: &[Row], cp: &Checkpoint) -> Result<(), IndexerError> {
            if self.fail.load(Ordering::SeqCst) > 0 {
                self.fail.fetch_sub(1, Ordering::SeqCst);
                return Err(IndexerError::Storage("database is locked".into()));
            }
            self.inner.commit(rows, cp).await
        }
    }

    fn config() -> IndexerConfig {
        IndexerConfig {
            program_filter_id: PROGRAM.into(),
            poll_interval_ms: 1,
            retry_delay_ms: 1,
            ..Default::default()
        }
    }

    fn decoder() -> BlockDecoder {
        BlockDecoder::new(PROGRAM, Box::new(Any))
    }

    #[tokio::test]
    async fn cycle_commits_then_idles() {
        let store = Arc::new(MemoryCheckpointStore::new());
        let mut lp = IndexLoop::new(config(), Ledger, decoder(), Box::new(store.clone()));

        let out = lp.run_cycle().await.unwrap();
        assert_eq!(
            out,
            CycleOutcome::Committed {
                blocks: 3,
                rows: 3,
                checkpoint: Checkpoint::new(3, 3),
            }
        );
        assert_eq!(lp.run_cycle().await.unwrap(), CycleOutcome::Idle);

        let rows = store.rows();
        assert!(rows[0].payload.is_sentinel());
        assert!(!rows[1].payload.is_sentinel());
        assert!(rows[2].payload.is_sentinel());
    }

    #[tokio::test]
    async fn failed_commit_is_redone_with_same_ids() {
        let store = Arc::new(Flaky {
            inner: MemoryCheckpointStore::new(),
            fail: AtomicU32::new(1),
        });
        let mut lp = IndexLoop::new(config(), Ledger, decoder(), Box::new(store.clone()));

        let err = lp.run_cycle().await.unwrap_err();
        assert!(err.is_persistence());
        assert_eq!(lp.checkpoint(), Some(Checkpoint::new(0, 0)));

        let out = lp.run_cycle().await.unwrap();
        assert!(matches!(out, CycleOutcome::Committed { rows: 3, .. }));
        let ids: Vec<u64> = store.inner.rows().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    /// Commits, then reports failure anyway.
    struct LostAck {
        inner: MemoryCheckpointStore,
        lie: AtomicU32,
    }

    #[async_trait]
    impl CheckpointStore for LostAck {
        async fn load(&self) -> Result<Option<Checkpoint>, IndexerError> {
            self.inner.load().await
        }

        async fn commit(&self, rows: &[Row], cp: &Checkpoint) -> Result<(), IndexerError> {
            self.inner.commit(rows, cp).await?;
            if self.lie.load(Ordering::SeqCst) > 0 {
                self.lie.fetch_sub(1, Ordering::SeqCst);
                return Err(IndexerError::Storage("disk I/O error during fsync".into()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn durable_commit_reported_as_failure_is_not_replayed() {
        let store = Arc::new(LostAck {
            inner: MemoryCheckpointStore::new(),
            lie: AtomicU32::new(1),
        });
        let mut lp = IndexLoop::new(config(), Ledger, decoder(), Box::new(store.clone()));

        assert!(lp.run_cycle().await.unwrap_err().is_persistence());
        assert_eq!(lp.checkpoint(), Some(Checkpoint::new(3, 3)));

        assert_eq!(lp.run_cycle().await.unwrap(), CycleOutcome::Idle);
        let ids: Vec<u64> = store.inner.rows().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn cursor_follows_store_moved_by_another_writer() {
        let store = Arc::new(MemoryCheckpointStore::new());
        let mut lp = IndexLoop::new(config(), Ledger, decoder(), Box::new(store.clone()));
        lp.resume().await.unwrap();

        // Another writer covers slot 1 first.
        let other = Row {
            id: 0,
            block_id: 1,
            payload: slotstream_core::types::RowPayload::Sentinel,
        };
        store.commit(&[other], &Checkpoint::new(1, 1)).await.unwrap();

        let err = lp.run_cycle().await.unwrap_err();
        assert!(matches!(
            err,
            IndexerError::CheckpointMismatch { expected: 1, actual: 0 }
        ));
        assert_eq!(lp.checkpoint(), Some(Checkpoint::new(1, 1)));

        let out = lp.run_cycle().await.unwrap();
        assert_eq!(
            out,
            CycleOutcome::Committed {
                blocks: 2,
                rows: 2,
                checkpoint: Checkpoint::new(3, 3),
            }
        );
    }

    #[tokio::test]
    async fn abort_policy_surfaces_storage_error() {
        let store = Flaky {
            inner: MemoryCheckpointStore::new(),
            fail: AtomicU32::new(u32::MAX),
        };
        let cfg = IndexerConfig {
            on_persistence_failure: PersistenceFailurePolicy::Abort,
            ..config()
        };
        let mut lp = IndexLoop::new(cfg, Ledger, decoder(), Box::new(store));
        let err = lp.run().await.unwrap_err();
        assert!(matches!(err, IndexerError::Storage(_)));
        assert_eq!(lp.state(), IndexerState::Error);
    }

    #[tokio::test]
    async fn retry_policy_keeps_running_through_storage_errors() {
        let store = Arc::new(Flaky {
            inner: MemoryCheckpointStore::new(),
            fail: AtomicU32::new(2),
        });
        let mut lp = IndexLoop::new(config(), Ledger, decoder(), Box::new(store.clone()));
        let timed_out =
            tokio::time::timeout(std::time::Duration::from_millis(200), lp.run()).await;
        assert!(timed_out.is_err(), "run should still be looping");
        assert_eq!(lp.state(), IndexerState::Running);
        assert_eq!(store.inner.rows().len(), 3);
        assert_eq!(store.inner.load().await.unwrap(), Some(Checkpoint::new(3, 3)));
    }
}
