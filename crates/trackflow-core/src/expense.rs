//! Expense types shared between the submission form, the offline queue and the remote service.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Upper bound on the category label, in characters.
pub const MAX_CATEGORY_LEN: usize = 64;
/// Upper bound on the free-text description, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 500;
/// Schema version written into every [`QueuedExpense`].
pub const QUEUED_EXPENSE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("amount must be a finite number greater than zero, got {0}")]
    Amount(f64),
    #[error("currency must be a 3-letter ISO 4217 code, got {0:?}")]
    Currency(String),
    #[error("category must not be empty")]
    EmptyCategory,
    #[error("category is {len} characters long (max {max})", max = MAX_CATEGORY_LEN)]
    CategoryTooLong { len: usize },
    #[error("description is {len} characters long (max {max})", max = MAX_DESCRIPTION_LEN)]
    DescriptionTooLong { len: usize },
}

/// Client-generated identifier of a queued expense.
///
/// Assigned once when the record is created and reused for every delivery
/// attempt, so the server can deduplicate retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpenseId(Uuid);

impl ExpenseId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ExpenseId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExpenseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ExpenseId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// An expense as entered on the submission form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpensePayload {
    pub amount: f64,
    pub currency: String,
    pub category: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub description: Option<String>,
    /// Local receipt files, uploaded alongside the expense.
    #[serde(default)]
    pub receipts: Vec<PathBuf>,
}

impl ExpensePayload {
    pub fn new(
        amount: f64,
        currency: impl Into<String>,
        category: impl Into<String>,
        date: NaiveDate,
    ) -> Self {
        Self {
            amount,
            currency: currency.into(),
            category: category.into(),
            date,
            description: None,
            receipts: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_receipt(mut self, path: impl Into<PathBuf>) -> Self {
        self.receipts.push(path.into());
        self
    }

    /// Check shape and range rules, reporting the first violation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(ValidationError::Amount(self.amount));
        }
        if !is_currency_code(&self.currency) {
            return Err(ValidationError::Currency(self.currency.clone()));
        }
        let category = self.category.trim();
        if category.is_empty() {
            return Err(ValidationError::EmptyCategory);
        }
        let len = category.chars().count();
        if len > MAX_CATEGORY_LEN {
            return Err(ValidationError::CategoryTooLong { len });
        }
        if let Some(desc) = &self.description {
            let len = desc.chars().count();
            if len > MAX_DESCRIPTION_LEN {
                return Err(ValidationError::DescriptionTooLong { len });
            }
        }
        Ok(())
    }
}

fn is_currency_code(code: &str) -> bool {
    code.len() == 3 && code.bytes().all(|b| b.is_ascii_uppercase())
}

/// A validated expense waiting in the offline queue.
///
/// Immutable once built: there are no setters, and a correction is a new
/// record with a new id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedExpense {
    #[serde(default = "default_version")]
    version: u32,
    id: ExpenseId,
    queued_at: DateTime<Utc>,
    payload: ExpensePayload,
}

fn default_version() -> u32 {
    QUEUED_EXPENSE_VERSION
}

impl QueuedExpense {
    /// Validate `payload` and wrap it with a fresh client id.
    pub fn new(payload: ExpensePayload) -> Result<Self, ValidationError> {
        payload.validate()?;
        Ok(Self {
            version: QUEUED_EXPENSE_VERSION,
            id: ExpenseId::new(),
            queued_at: Utc::now(),
            payload,
        })
    }

    pub fn id(&self) -> ExpenseId {
        self.id
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn queued_at(&self) -> DateTime<Utc> {
        self.queued_at
    }

    pub fn payload(&self) -> &ExpensePayload {
        &self.payload
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpenseStatus {
    Pending,
    Approved,
    Rejected,
    Escalated,
}

/// The server-canonical expense record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: String,
    pub amount: f64,
    pub currency: String,
    pub category: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub receipt_urls: Vec<String>,
    pub status: ExpenseStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Placeholder handed back to the form when an expense was queued instead of delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingAck {
    pub id: ExpenseId,
    pub queued_at: DateTime<Utc>,
}

/// Outcome of submitting an expense.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Delivered(Expense),
    Queued(PendingAck),
}

impl Submission {
    pub fn is_queued(&self) -> bool {
        matches!(self, Submission::Queued(_))
    }
}
