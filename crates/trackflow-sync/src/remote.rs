//! The remote expense-submission endpoint, as seen by the queue.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use trackflow_core::{Expense, QueuedExpense};

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server rejected expense ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("server returned {status}: {body}")]
    Transient { status: u16, body: String },
    #[error("server accepted expense but the response could not be read: {0}")]
    Decode(String),
    #[error("cannot read receipt {}: {source}", .path.display())]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DeliveryError {
    /// Classify a non-2xx response. Timeouts, rate limiting and 5xx are
    /// transient; every other status is a rejection of the record itself.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            408 | 429 | 500..=599 => DeliveryError::Transient { status, body },
            _ => DeliveryError::Rejected { status, body },
        }
    }

    /// Whether the same record may succeed later without being changed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DeliveryError::Network(_) | DeliveryError::Transient { .. }
        )
    }

    /// The server answered 2xx, so the record was delivered even though
    /// the canonical copy could not be read back.
    pub fn is_acknowledged(&self) -> bool {
        matches!(self, DeliveryError::Decode(_))
    }
}

/// Delivers one queued expense to the expense service.
///
/// Implementations must send `record.id()` along so the service can
/// recognise a redelivery of the same record.
#[async_trait]
pub trait ExpenseRemote: Send + Sync {
    async fn submit(&self, record: &QueuedExpense) -> Result<Expense, DeliveryError>;
}
