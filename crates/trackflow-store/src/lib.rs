//! Storage layer for the offline queue: in-memory, file-backed and (optionally) DuckDB.
//!
//! All backends keep records keyed by their client id and hand them back in
//! insertion order. Delivery order is still the drain routine's job; callers
//! must not rely on storage order alone.

mod error;
mod file;
mod memory;

pub use error::StoreError;
pub use file::FileStore;
pub use memory::MemoryStore;

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::DuckStore;

use async_trait::async_trait;
use trackflow_core::expense::QUEUED_EXPENSE_VERSION;
use trackflow_core::{ExpenseId, QueuedExpense};

/// Key-addressed durable storage for queued expenses.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Store `record` under its id. A second write with the same id replaces
    /// the first and keeps its position.
    async fn enqueue(&self, record: &QueuedExpense) -> Result<(), StoreError>;

    /// All stored records, oldest first.
    async fn list_all(&self) -> Result<Vec<QueuedExpense>, StoreError>;

    /// Delete the record with `id`. Absent ids are not an error.
    async fn remove(&self, id: ExpenseId) -> Result<(), StoreError>;

    /// Delete every record. Only for an explicit user reset.
    async fn clear(&self) -> Result<(), StoreError>;

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.list_all().await?.len())
    }
}

/// Reject records written by a newer client instead of guessing at their shape.
pub(crate) fn check_version(record: &QueuedExpense) -> Result<(), StoreError> {
    if record.version() > QUEUED_EXPENSE_VERSION {
        return Err(StoreError::UnsupportedVersion {
            id: record.id(),
            version: record.version(),
        });
    }
    Ok(())
}
