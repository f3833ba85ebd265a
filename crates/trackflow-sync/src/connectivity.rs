//! Network reachability as reported by the host runtime.
//!
//! Nothing here probes the network. The host calls
//! [`Connectivity::set_online`] from its own online/offline signal and every
//! subscriber sees each real change exactly once.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Online,
    Offline,
}

impl Transition {
    pub fn is_online(self) -> bool {
        self == Transition::Online
    }
}

struct Inner {
    online: Mutex<bool>,
    events: broadcast::Sender<Transition>,
}

/// Shared handle to the current connectivity flag.
#[derive(Clone)]
pub struct Connectivity {
    inner: Arc<Inner>,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                online: Mutex::new(online),
                events,
            }),
        }
    }

    pub fn is_online(&self) -> bool {
        *self.inner.online.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the runtime's latest signal.
    ///
    /// Returns `true` and notifies subscribers only if the flag changed;
    /// a repeated identical signal is swallowed.
    pub fn set_online(&self, online: bool) -> bool {
        let mut current = self
            .inner
            .online
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *current == online {
            return false;
        }
        *current = online;
        let transition = if online {
            Transition::Online
        } else {
            Transition::Offline
        };
        info!(?transition, "connectivity changed");
        // No subscribers is fine: the flag itself is the source of truth.
        let _ = self.inner.events.send(transition);
        true
    }

    /// Receive every transition from now on.
    pub fn subscribe(&self) -> ConnectivityEvents {
        ConnectivityEvents {
            rx: self.inner.events.subscribe(),
        }
    }
}

/// Stream of connectivity transitions for one subscriber.
pub struct ConnectivityEvents {
    rx: broadcast::Receiver<Transition>,
}

impl ConnectivityEvents {
    /// Wait for the next transition. `None` once every [`Connectivity`] handle is gone.
    pub async fn next(&mut self) -> Option<Transition> {
        loop {
            match self.rx.recv().await {
                Ok(transition) => return Some(transition),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "connectivity subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
