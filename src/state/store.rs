//! Latest bout snapshot with change notification.
//!
//! The store holds exactly one [`Snapshot`] behind an `Arc`. A replacement
//! swaps the whole `Arc` in one step, so readers either see the old snapshot
//! or the new one, never a mix of the two.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::bout::BoutState;

/// A bout state plus bookkeeping about when it arrived.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub state: BoutState,

    /// 0 for the startup default, +1 per replacement
    pub sequence: u64,

    /// None until the first replacement
    pub received_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    /// Whether this is still the startup default.
    pub fn is_initial(&self) -> bool {
        self.sequence == 0
    }
}

/// Receiver side for observers. `changed().await` wakes on every replacement.
pub type SnapshotWatch = watch::Receiver<Arc<Snapshot>>;

/// Holder of the single live bout snapshot.
///
/// Cloning the store yields another handle to the same snapshot.
#[derive(Debug, Clone)]
pub struct BoutStateStore {
    tx: Arc<watch::Sender<Arc<Snapshot>>>,
}

impl Default for BoutStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BoutStateStore {
    /// Create a store holding the default snapshot.
    pub fn new() -> Self {
        Self {
            tx: Arc::new(watch::Sender::new(Arc::new(Snapshot::default()))),
        }
    }

    /// Swap in a new state wholesale. Returns the new sequence number.
    pub fn replace(&self, state: BoutState) -> u64 {
        let mut sequence = 0;
        self.tx.send_modify(|current| {
            sequence = current.sequence + 1;
            *current = Arc::new(Snapshot {
                state,
                sequence,
                received_at: Some(Utc::now()),
            });
        });
        sequence
    }

    /// Latest bout state (the default before any update).
    pub fn current(&self) -> BoutState {
        self.tx.borrow().state.clone()
    }

    /// Latest snapshot, shared.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&*self.tx.borrow())
    }

    /// Register an observer.
    pub fn subscribe(&self) -> SnapshotWatch {
        self.tx.subscribe()
    }

    /// Number of replacements applied so far.
    pub fn sequence(&self) -> u64 {
        self.tx.borrow().sequence
    }

    /// Number of live subscribers.
    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
