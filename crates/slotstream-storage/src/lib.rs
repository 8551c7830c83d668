//! slotstream-storage — durable sinks for SlotStream.
//!
//! Backends:
//! - [`sqlite`] — SQLite via `sqlx` (single file, rows + checkpoint in one transaction)
//!
//! The in-memory store used by tests lives in `slotstream_core::checkpoint`.

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStorage;
