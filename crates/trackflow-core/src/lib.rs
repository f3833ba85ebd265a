pub mod config;
pub mod exchange;
pub mod expense;
pub mod receipt;
pub mod sync_state;

pub use config::ClientConfig;
pub use exchange::ExchangeRates;
pub use expense::{
    Expense, ExpenseId, ExpensePayload, ExpenseStatus, PendingAck, QueuedExpense, Submission,
    ValidationError,
};
pub use receipt::{ReceiptScan, parse_receipt_text};
pub use sync_state::{SyncPhase, SyncState};
