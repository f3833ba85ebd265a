//! Status of the offline queue reconciliation, as shown by the sync indicator.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// High-level phase of the reconciliation process.
///
/// Legal transitions: `Idle -> Syncing`, `Error -> Syncing`,
/// `Syncing -> Idle`, `Syncing -> Error`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    #[default]
    Idle,
    Syncing,
    Error,
}

impl SyncPhase {
    pub fn can_transition_to(self, next: SyncPhase) -> bool {
        matches!(
            (self, next),
            (SyncPhase::Idle, SyncPhase::Syncing)
                | (SyncPhase::Error, SyncPhase::Syncing)
                | (SyncPhase::Syncing, SyncPhase::Idle)
                | (SyncPhase::Syncing, SyncPhase::Error)
        )
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Syncing => "syncing",
            SyncPhase::Error => "error",
        })
    }
}

/// Snapshot of the sync status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    /// Last known network reachability.
    pub online: bool,
    pub phase: SyncPhase,
    /// Number of records currently queued.
    pub pending: usize,
    /// Message from the failure that put the phase into `Error`.
    pub last_error: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl SyncState {
    pub fn new(online: bool, pending: usize) -> Self {
        Self {
            online,
            pending,
            ..Self::default()
        }
    }
}
