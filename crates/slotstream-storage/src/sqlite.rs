//! SQLite storage backend for SlotStream.
//!
//! Persists rows and the ingestion checkpoint to a single SQLite file. A
//! batch of rows and its checkpoint are written in one transaction, so a
//! crash mid-commit leaves neither behind.
//!
//! # Usage
//! ```rust,no_run
//! use slotstream_storage::sqlite::SqliteStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteStorage::open("./slotstream.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteStorage::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row as _, SqlitePool};
use tracing::{debug, info};

use slotstream_core::checkpoint::{Checkpoint, CheckpointStore};
use slotstream_core::error::IndexerError;
use slotstream_core::types::{BlockId, Row, RowPayload};

fn storage_err(e: impl std::fmt::Display) -> IndexerError {
    IndexerError::Storage(e.to_string())
}

/// SQLite-backed row and checkpoint storage.
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./slotstream.db"`) or a full
    /// SQLite URL (`"sqlite:./slotstream.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, IndexerError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url).await.map_err(storage_err)?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Every connection to `sqlite::memory:` is its own database, so the pool
    /// is pinned to one connection that never expires.
    pub async fn in_memory() -> Result<Self, IndexerError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(storage_err)?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Create tables and enable WAL mode.
    async fn init_schema(&self) -> Result<(), IndexerError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS rows (
                id          INTEGER PRIMARY KEY,
                block_slot  INTEGER NOT NULL,
                payload     TEXT    NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_rows_block ON rows (block_slot);")
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        // Single-row table: the CHECK pins the key to 0.
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS checkpoint (
                singleton    INTEGER PRIMARY KEY CHECK (singleton = 0),
                next_row_id  INTEGER NOT NULL,
                last_block   INTEGER NOT NULL,
                updated_at   INTEGER NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    // ─── Reads ──────────────────────────────────────────────────────────────────

    /// Total number of stored rows, sentinels included.
    pub async fn row_count(&self) -> Result<u64, IndexerError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM rows")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(row.get::<i64, _>("cnt") as u64)
    }

    /// Up to `limit` rows with `id >= from`, in id order.
    pub async fn rows_from(&self, from: u64, limit: u32) -> Result<Vec<Row>, IndexerError> {
        let rows = sqlx::query(
            "SELECT id, block_slot, payload FROM rows WHERE id >= ? ORDER BY id LIMIT ?",
        )
        .bind(from as i64)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        rows.iter().map(decode_row).collect()
    }

    /// All rows recorded for one slot, in id order.
    pub async fn rows_for_block(&self, slot: BlockId) -> Result<Vec<Row>, IndexerError> {
        let rows = sqlx::query(
            "SELECT id, block_slot, payload FROM rows WHERE block_slot = ? ORDER BY id",
        )
        .bind(slot as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        rows.iter().map(decode_row).collect()
    }

    /// When the checkpoint was last written.
    pub async fn last_commit_time(&self) -> Result<Option<DateTime<Utc>>, IndexerError> {
        let row = sqlx::query("SELECT updated_at FROM checkpoint WHERE singleton = 0")
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(row.and_then(|r| Utc.timestamp_opt(r.get::<i64, _>("updated_at"), 0).single()))
    }

    /// `(max(id), max(block_slot))` over the row table, `None` when empty.
    async fn row_extent(&self) -> Result<Option<(u64, BlockId)>, IndexerError> {
        let row = sqlx::query("SELECT MAX(id) AS max_id, MAX(block_slot) AS max_slot FROM rows")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        let max_id: Option<i64> = row.get("max_id");
        let max_slot: Option<i64> = row.get("max_slot");
        Ok(max_id.zip(max_slot).map(|(id, slot)| (id as u64, slot as BlockId)))
    }
}

fn decode_row(r: &SqliteRow) -> Result<Row, IndexerError> {
    let payload: String = r.get("payload");
    let payload: RowPayload = serde_json::from_str(&payload).map_err(storage_err)?;
    Ok(Row {
        id: r.get::<i64, _>("id") as u64,
        block_id: r.get::<i64, _>("block_slot") as BlockId,
        payload,
    })
}

// ─── CheckpointStore impl ────────────────────────────────────────────────────

#[async_trait]
impl CheckpointStore for SqliteStorage {
    /// Load the checkpoint and check it against the row table.
    async fn load(&self) -> Result<Option<Checkpoint>, IndexerError> {
        let row = sqlx::query("SELECT next_row_id, last_block FROM checkpoint WHERE singleton = 0")
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        let stored = row.map(|r| {
            Checkpoint::new(
                r.get::<i64, _>("next_row_id") as u64,
                r.get::<i64, _>("last_block") as BlockId,
            )
        });
        let extent = self.row_extent().await?;

        match (stored, extent) {
            (Some(cp), extent) => {
                let from_rows = extent.map(|(max_id, _)| max_id + 1).unwrap_or(0);
                if cp.next_row_id != from_rows {
                    return Err(IndexerError::CheckpointMismatch {
                        expected: cp.next_row_id,
                        actual: from_rows,
                    });
                }
                Ok(Some(cp))
            }
            (None, Some((max_id, max_slot))) => {
                let cp = Checkpoint::new(max_id + 1, max_slot);
                info!(
                    next_row_id = cp.next_row_id,
                    last_block = cp.last_block,
                    "recovered checkpoint from row table"
                );
                Ok(Some(cp))
            }
            (None, None) => Ok(None),
        }
    }

    async fn commit(&self, rows: &[Row], checkpoint: &Checkpoint) -> Result<(), IndexerError> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        if let Some(first) = rows.first() {
            let expected = match sqlx::query("SELECT next_row_id FROM checkpoint WHERE singleton = 0")
                .fetch_optional(&mut *tx)
                .await
                .map_err(storage_err)?
            {
                Some(r) => r.get::<i64, _>("next_row_id") as u64,
                None => {
                    let r = sqlx::query("SELECT MAX(id) AS max_id FROM rows")
                        .fetch_one(&mut *tx)
                        .await
                        .map_err(storage_err)?;
                    r.get::<Option<i64>, _>("max_id").map(|m| m as u64 + 1).unwrap_or(0)
                }
            };
            if first.id != expected {
                return Err(IndexerError::CheckpointMismatch {
                    expected,
                    actual: first.id,
                });
            }
        }

        for row in rows {
            let payload = serde_json::to_string(&row.payload).map_err(storage_err)?;
            sqlx::query("INSERT INTO rows (id, block_slot, payload) VALUES (?, ?, ?)")
                .bind(row.id as i64)
                .bind(row.block_id as i64)
                .bind(&payload)
                .execute(&mut *tx)
                .await
                .map_err(storage_err)?;
        }

        sqlx::query(
            "INSERT OR REPLACE INTO checkpoint (singleton, next_row_id, last_block, updated_at)
             VALUES (0, ?, ?, ?)",
        )
        .bind(checkpoint.next_row_id as i64)
        .bind(checkpoint.last_block as i64)
        .bind(Utc::now().timestamp())
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)?;

        debug!(
            rows = rows.len(),
            next_row_id = checkpoint.next_row_id,
            last_block = checkpoint.last_block,
            "batch committed"
        );
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
