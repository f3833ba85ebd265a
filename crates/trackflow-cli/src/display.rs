//! Plain-text rendering of queue contents, sync status and command results.

use trackflow_core::{Expense, QueuedExpense, ReceiptScan, Submission, SyncState};
use trackflow_sync::{DrainOutcome, SkipReason};

fn field(label: &str, value: impl std::fmt::Display) {
    println!("  {:<16} {}", label, value);
}

fn optional_field<T: std::fmt::Display>(label: &str, value: Option<T>) {
    if let Some(value) = value {
        field(label, value);
    }
}

// ── Submission ──

pub fn print_submission(submission: &Submission) {
    match submission {
        Submission::Delivered(expense) => {
            println!("Expense delivered");
            print_expense(expense);
        }
        Submission::Queued(ack) => {
            println!("Offline: expense queued for sync");
            field("id", ack.id);
            field("queued at", ack.queued_at.format("%Y-%m-%d %H:%M:%S UTC"));
        }
    }
}

fn print_expense(expense: &Expense) {
    field("id", &expense.id);
    field(
        "amount",
        format!("{:.2} {}", expense.amount, expense.currency),
    );
    field("category", &expense.category);
    field("date", expense.date);
    field("status", format!("{:?}", expense.status));
    optional_field("description", expense.description.as_deref());
    if !expense.receipt_urls.is_empty() {
        field("receipts", expense.receipt_urls.join(", "));
    }
}

// ── Queue ──

pub fn print_pending(records: &[QueuedExpense]) {
    if records.is_empty() {
        println!("No expenses waiting to sync.");
        return;
    }

    println!(
        "{:<36}  {:<19}  {:>12}  {:<4}  {:<10}  {}",
        "ID", "QUEUED", "AMOUNT", "CCY", "DATE", "CATEGORY"
    );
    for record in records {
        let payload = record.payload();
        println!(
            "{:<36}  {:<19}  {:>12.2}  {:<4}  {:<10}  {}",
            record.id(),
            record.queued_at().format("%Y-%m-%d %H:%M:%S"),
            payload.amount,
            payload.currency,
            payload.date,
            payload.category,
        );
    }
    println!("\n{} expense(s) pending", records.len());
}

// ── Sync ──

pub fn print_state(state: &SyncState) {
    println!("Sync status");
    field("connectivity", if state.online { "online" } else { "offline" });
    field("phase", state.phase);
    field("pending", state.pending);
    optional_field(
        "last synced",
        state
            .last_synced_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC")),
    );
    optional_field("last error", state.last_error.as_deref());
}

pub fn print_outcome(outcome: &DrainOutcome) {
    match outcome {
        DrainOutcome::Completed { delivered } => {
            println!("Sync complete: {delivered} expense(s) delivered");
        }
        DrainOutcome::Halted {
            delivered,
            failed,
            error,
        } => {
            println!("Sync stopped after {delivered} delivered expense(s)");
            optional_field("failed record", failed.as_ref());
            field("error", error);
        }
        DrainOutcome::Skipped(SkipReason::Offline) => {
            println!("Offline: nothing was sent");
        }
        DrainOutcome::Skipped(SkipReason::InProgress) => {
            println!("A sync is already running");
        }
    }
}

// ── Receipts ──

pub fn print_scan(scan: &ReceiptScan) {
    println!("Receipt scan");
    optional_field("vendor", scan.vendor.as_deref());
    optional_field("amount", scan.amount.map(|a| format!("{a:.2}")));
    optional_field("date", scan.date.as_deref());
    optional_field("category", scan.category.as_deref());
    if scan.vendor.is_none()
        && scan.amount.is_none()
        && scan.date.is_none()
        && scan.category.is_none()
    {
        println!("  (nothing recognised)");
    }
}
