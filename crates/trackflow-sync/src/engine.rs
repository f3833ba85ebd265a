//! Offline queue reconciliation: the submission entry point and the drain routine.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use trackflow_core::{
    ExpenseId, ExpensePayload, PendingAck, QueuedExpense, Submission, SyncPhase, SyncState,
    ValidationError,
};
use trackflow_store::{QueueStore, StoreError};

use crate::connectivity::{Connectivity, Transition};
use crate::remote::{DeliveryError, ExpenseRemote};

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The service answered and will not take this record as it is.
    #[error("expense not accepted: {0}")]
    Remote(#[source] DeliveryError),
    /// A receipt file cannot be read; the record is not queued.
    #[error("cannot read receipt {}: {source}", .path.display())]
    Attachment {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The record could not be queued, so it is lost unless the caller keeps it.
    #[error("could not queue expense: {0}")]
    Storage(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another drain holds the guard; this trigger was folded into it.
    InProgress,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    Completed {
        delivered: usize,
    },
    /// Stopped at the first failure. `failed` is the record that could not be
    /// delivered, or `None` if the store itself failed.
    Halted {
        delivered: usize,
        failed: Option<ExpenseId>,
        error: String,
    },
    Skipped(SkipReason),
}

struct Halt {
    failed: Option<ExpenseId>,
    error: String,
}

/// Owns the offline queue's reconciliation with the expense service.
///
/// Sync status is published on a watch channel (see [`subscribe`](Self::subscribe))
/// instead of living in shared globals. At most one drain runs at a time.
pub struct SyncEngine {
    store: Arc<dyn QueueStore>,
    remote: Arc<dyn ExpenseRemote>,
    connectivity: Connectivity,
    drain_guard: Mutex<()>,
    /// Set by triggers that arrive mid-drain; the running drain re-reads the store.
    rerun: AtomicBool,
    state: watch::Sender<SyncState>,
}

impl SyncEngine {
    /// Build the engine, seeding the pending count from the store.
    pub async fn new(
        store: Arc<dyn QueueStore>,
        remote: Arc<dyn ExpenseRemote>,
        connectivity: Connectivity,
    ) -> Result<Self, StoreError> {
        let pending = store.count().await?;
        let (state, _) = watch::channel(SyncState::new(connectivity.is_online(), pending));
        info!(pending, online = connectivity.is_online(), "sync engine ready");
        Ok(Self {
            store,
            remote,
            connectivity,
            drain_guard: Mutex::new(()),
            rerun: AtomicBool::new(false),
            state,
        })
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    /// Current sync status, with connectivity read live.
    pub fn state(&self) -> SyncState {
        self.observe_connectivity();
        self.state.borrow().clone()
    }

    /// Follow sync status changes, e.g. for a passive status indicator.
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    pub async fn pending(&self) -> Result<Vec<QueuedExpense>, StoreError> {
        self.store.list_all().await
    }

    /// Submit an expense, delivering now if possible and queueing otherwise.
    ///
    /// Validation failures and outright rejections come back as errors and
    /// are never queued. Network failures and transient server errors queue
    /// the record and return a placeholder acknowledgment.
    pub async fn submit(&self, payload: ExpensePayload) -> Result<Submission, SubmitError> {
        let record = QueuedExpense::new(payload)?;
        check_receipts(&record).await?;

        if !self.observe_connectivity() {
            info!(id = %record.id(), "offline, queueing expense");
            return self.enqueue(record).await;
        }

        match self.remote.submit(&record).await {
            Ok(expense) => {
                info!(id = %record.id(), server_id = %expense.id, "expense delivered");
                Ok(Submission::Delivered(expense))
            }
            Err(e) if e.is_retryable() => {
                warn!(id = %record.id(), error = %e, "delivery failed, queueing expense");
                self.enqueue(record).await
            }
            Err(DeliveryError::Attachment { path, source }) => {
                Err(SubmitError::Attachment { path, source })
            }
            Err(e) => Err(SubmitError::Remote(e)),
        }
    }

    async fn enqueue(&self, record: QueuedExpense) -> Result<Submission, SubmitError> {
        self.store.enqueue(&record).await?;
        self.refresh_pending().await;
        Ok(Submission::Queued(PendingAck {
            id: record.id(),
            queued_at: record.queued_at(),
        }))
    }

    /// Deliver every queued record, oldest first, stopping at the first failure.
    ///
    /// Each delivered record is removed before moving on; the failed record
    /// and everything after it stay queued for the next trigger. A call made
    /// while another drain is running returns
    /// [`Skipped(InProgress)`](SkipReason::InProgress) and makes the running
    /// drain read the store once more before going idle.
    pub async fn drain(&self) -> DrainOutcome {
        let Ok(guard) = self.drain_guard.try_lock() else {
            self.rerun.store(true, Ordering::SeqCst);
            debug!("drain already running, trigger coalesced");
            return DrainOutcome::Skipped(SkipReason::InProgress);
        };
        let mut outcome = self.drain_locked(guard).await;

        // A trigger can land after the last rerun check but before the guard
        // is released; pick it up here. If another drain took the guard in
        // the meantime, it reads the store itself.
        while let DrainOutcome::Completed { delivered } = outcome {
            if !self.rerun.load(Ordering::SeqCst) {
                break;
            }
            let Ok(guard) = self.drain_guard.try_lock() else {
                break;
            };
            outcome = match self.drain_locked(guard).await {
                DrainOutcome::Completed { delivered: more } => DrainOutcome::Completed {
                    delivered: delivered + more,
                },
                DrainOutcome::Halted {
                    delivered: more,
                    failed,
                    error,
                } => DrainOutcome::Halted {
                    delivered: delivered + more,
                    failed,
                    error,
                },
                DrainOutcome::Skipped(_) => DrainOutcome::Completed { delivered },
            };
        }
        outcome
    }

    /// One drain under the guard, released when this returns.
    async fn drain_locked(&self, _guard: MutexGuard<'_, ()>) -> DrainOutcome {
        self.rerun.store(false, Ordering::SeqCst);
        if !self.observe_connectivity() {
            debug!("offline, drain skipped");
            return DrainOutcome::Skipped(SkipReason::Offline);
        }

        self.set_phase(SyncPhase::Syncing, None);
        let mut delivered = 0;

        loop {
            if let Err(halt) = self.drain_snapshot(&mut delivered).await {
                warn!(delivered, failed = ?halt.failed, error = %halt.error, "drain halted");
                self.refresh_pending().await;
                self.set_phase(SyncPhase::Error, Some(halt.error.clone()));
                return DrainOutcome::Halted {
                    delivered,
                    failed: halt.failed,
                    error: halt.error,
                };
            }
            self.refresh_pending().await;
            if !self.rerun.swap(false, Ordering::SeqCst) {
                break;
            }
            debug!("trigger arrived during drain, re-reading queue");
        }

        self.set_phase(SyncPhase::Idle, None);
        info!(delivered, "drain complete");
        DrainOutcome::Completed { delivered }
    }

    async fn drain_snapshot(&self, delivered: &mut usize) -> Result<(), Halt> {
        let snapshot = self.store.list_all().await.map_err(|e| Halt {
            failed: None,
            error: e.to_string(),
        })?;
        debug!(count = snapshot.len(), "draining offline queue");

        for record in snapshot {
            let id = record.id();
            match self.remote.submit(&record).await {
                Ok(expense) => debug!(id = %id, server_id = %expense.id, "queued expense delivered"),
                Err(e) if e.is_acknowledged() => {
                    warn!(id = %id, error = %e, "delivered but response unreadable")
                }
                Err(e) => {
                    return Err(Halt {
                        failed: Some(id),
                        error: e.to_string(),
                    });
                }
            }
            self.store.remove(id).await.map_err(|e| Halt {
                failed: Some(id),
                error: e.to_string(),
            })?;
            *delivered += 1;
            self.state
                .send_modify(|s| s.pending = s.pending.saturating_sub(1));
        }
        Ok(())
    }

    /// Drop one queued record without delivering it, e.g. one the service keeps rejecting.
    pub async fn discard(&self, id: ExpenseId) -> Result<(), StoreError> {
        let _guard = self.drain_guard.lock().await;
        self.store.remove(id).await?;
        info!(id = %id, "queued expense discarded");
        self.refresh_pending().await;
        Ok(())
    }

    /// Drop every queued record. Waits for a running drain to finish first.
    pub async fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.drain_guard.lock().await;
        self.store.clear().await?;
        self.state.send_modify(|s| s.pending = 0);
        Ok(())
    }

    /// Drain whenever connectivity comes back, until the task is aborted.
    ///
    /// Subscribes before returning, so a transition signalled right after
    /// this call is not missed.
    pub fn spawn_auto_sync(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        let mut events = self.connectivity.subscribe();
        tokio::spawn(async move {
            while let Some(transition) = events.next().await {
                engine.observe_connectivity();
                if transition == Transition::Online {
                    info!("connectivity restored, draining offline queue");
                    let outcome = engine.drain().await;
                    debug!(?outcome, "automatic drain finished");
                }
            }
        })
    }

    fn set_phase(&self, next: SyncPhase, error: Option<String>) {
        self.state.send_modify(|s| {
            debug_assert!(
                s.phase.can_transition_to(next),
                "illegal sync phase change {} -> {}",
                s.phase,
                next
            );
            s.phase = next;
            match next {
                SyncPhase::Idle => {
                    s.last_error = None;
                    s.last_synced_at = Some(Utc::now());
                }
                SyncPhase::Error => s.last_error = error,
                SyncPhase::Syncing => {}
            }
        });
    }

    /// Copy the live connectivity flag into the published state.
    fn observe_connectivity(&self) -> bool {
        let online = self.connectivity.is_online();
        self.state.send_if_modified(|s| {
            let changed = s.online != online;
            s.online = online;
            changed
        });
        online
    }

    async fn refresh_pending(&self) {
        match self.store.count().await {
            Ok(pending) => self.state.send_modify(|s| s.pending = pending),
            Err(e) => warn!(error = %e, "could not count queued expenses"),
        }
    }
}

/// Every receipt must be a readable file before the record is sent or queued,
/// so a bad path never reaches the queue and blocks the drains behind it.
async fn check_receipts(record: &QueuedExpense) -> Result<(), SubmitError> {
    for path in &record.payload().receipts {
        let attachment = |source| SubmitError::Attachment {
            path: path.clone(),
            source,
        };
        let meta = tokio::fs::metadata(path).await.map_err(attachment)?;
        if !meta.is_file() {
            return Err(attachment(io::Error::new(
                io::ErrorKind::InvalidInput,
                "not a regular file",
            )));
        }
        tokio::fs::File::open(path).await.map_err(attachment)?;
    }
    Ok(())
}
