//! One-shot completion signal shared between a grant and the requests
//! queued behind it.
//!
//! The [`Completer`] holds the write side of an [`async_lock::RwLock`] from
//! the moment the grant is admitted. Every [`Completion`] observer waits for
//! a read guard, which can only be taken once the completer has written the
//! final [`Settlement`] and dropped its guard.

use async_lock::{RwLock, RwLockWriteGuardArc};
use std::fmt;
use std::sync::Arc;

/// Final state of a grant's signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Settlement {
    Pending,
    Released,
    TimedOut,
}

/// Write side of the signal. Exactly one exists per grant.
pub(crate) struct Completer {
    guard: RwLockWriteGuardArc<Settlement>,
}

/// Observer side of the signal. Cheap to clone into wait snapshots.
#[derive(Clone)]
pub(crate) struct Completion {
    cell: Arc<RwLock<Settlement>>,
}

pub(crate) fn channel() -> (Completer, Completion) {
    let cell = Arc::new(RwLock::new(Settlement::Pending));
    let guard = match cell.try_write_arc() {
        Some(guard) => guard,
        // Nobody else can reach a lock created on the line above.
        None => unreachable!(),
    };
    (Completer { guard }, Completion { cell })
}

impl Completer {
    /// Publish `outcome` and wake every observer.
    pub(crate) fn settle(mut self, outcome: Settlement) {
        debug_assert_ne!(outcome, Settlement::Pending);
        *self.guard = outcome;
    }
}

impl Completion {
    /// Resolves once the grant has been released or timed out. Either
    /// outcome counts as drained.
    pub(crate) async fn settled(&self) -> Settlement {
        *self.cell.read().await
    }

    pub(crate) fn try_settlement(&self) -> Settlement {
        match self.cell.try_read() {
            Some(state) => *state,
            None => Settlement::Pending,
        }
    }
}

/// Waits until every signal in `snapshot` has settled.
pub(crate) async fn drained(snapshot: Vec<Completion>) {
    for completion in snapshot {
        completion.settled().await;
    }
}

impl fmt::Debug for Completer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completer").finish_non_exhaustive()
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("settlement", &self.try_settlement())
            .finish()
    }
}
