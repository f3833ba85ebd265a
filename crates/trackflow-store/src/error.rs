use thiserror::Error;
use trackflow_core::ExpenseId;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("offline queue quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("offline queue storage unavailable: {0}")]
    Unavailable(String),

    #[error("record {id} has schema version {version}, newer than this client understands")]
    UnsupportedVersion { id: ExpenseId, version: u32 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt record: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "duckdb")]
    #[error("duckdb error: {0}")]
    DuckDb(#[from] ::duckdb::Error),

    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Classify an I/O failure: a full device and denied access become store-level errors.
    pub(crate) fn from_io(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::StorageFull | ErrorKind::QuotaExceeded => {
                Self::QuotaExceeded(err.to_string())
            }
            ErrorKind::PermissionDenied | ErrorKind::ReadOnlyFilesystem => {
                Self::Unavailable(err.to_string())
            }
            _ => Self::Io(err),
        }
    }
}
