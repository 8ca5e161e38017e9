use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::lock::Lock;
use crate::mode::{LockMode, LockModeKind, ReadLocked, WriteLocked};
use crate::signal::{Completer, Settlement};

/// A shared grant on one key.
pub type ReadLockHandle = LockHandle<ReadLocked>;

/// An exclusive grant on one key.
pub type WriteLockHandle = LockHandle<WriteLocked>;

/// Capability for one admitted grant. The grant's mode is encoded in `M`.
///
/// The grant stays outstanding, and keeps every later conflicting request
/// waiting, until the handle is released, timed out or dropped. There is no
/// maximum hold time.
///
/// Releasing consumes the handle, so a grant cannot be released twice:
///
/// ```compile_fail
/// # use named_lock::LockTable;
/// # tokio_test::block_on(async {
/// let table = LockTable::new();
/// let handle = table.write_lock("x").await.unwrap();
/// handle.release();
/// handle.release();
/// # });
/// ```
#[must_use = "the grant is released as soon as the handle is dropped"]
pub struct LockHandle<M: LockMode> {
    lock: Arc<Lock>,
    id: u32,
    completer: Option<Completer>,
    _mode: PhantomData<M>,
}

impl<M: LockMode> LockHandle<M> {
    pub(crate) fn new(lock: Arc<Lock>, id: u32, completer: Completer) -> Self {
        Self {
            lock,
            id,
            completer: Some(completer),
            _mode: PhantomData,
        }
    }

    /// Grant id, unique among the grants currently outstanding on the key.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Key the grant was taken on.
    pub fn key(&self) -> &str {
        self.lock.key()
    }

    /// Whether this is a read or a write grant.
    pub fn mode(&self) -> LockModeKind {
        M::MODE
    }

    /// Give the grant back. Requests queued behind it re-evaluate.
    pub fn release(mut self) {
        self.finish(Settlement::Released);
    }

    /// Expire the grant as a failure. Waiters treat it as drained exactly
    /// like a release.
    pub fn timeout(mut self) {
        self.finish(Settlement::TimedOut);
    }

    fn finish(&mut self, outcome: Settlement) {
        if let Some(completer) = self.completer.take() {
            completer.settle(outcome);
            self.lock.deregister(M::MODE, self.id);
        }
    }
}

impl<M: LockMode> Drop for LockHandle<M> {
    fn drop(&mut self) {
        self.finish(Settlement::Released);
    }
}

impl<M: LockMode> fmt::Debug for LockHandle<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockHandle")
            .field("key", &self.key())
            .field("mode", &M::MODE)
            .field("id", &self.id)
            .finish()
    }
}
