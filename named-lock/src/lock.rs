//! Reader/writer admission for a single key.
//!
//! There is no explicit wait queue. Each request is admitted into the active
//! set immediately and captures a snapshot of the grants it conflicts with:
//! the outstanding writers for a read, every outstanding grant for a write.
//! It is granted once that snapshot has drained. Grants admitted later are
//! never added to an earlier request's snapshot.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use crate::config::{AcquireOptions, LockConfig};
use crate::error::{LockError, LockResult};
use crate::handle::{LockHandle, ReadLockHandle, WriteLockHandle};
use crate::mode::{LockMode, LockModeKind};
use crate::signal::{self, Completion};

/// Grant ids wrap back to zero here.
const ID_LIMIT: u32 = 1_000_000;

struct Grants {
    readers: HashMap<u32, Completion>,
    writers: HashMap<u32, Completion>,
    next_id: u32,
    id_limit: u32,
}

impl Grants {
    fn new(id_limit: u32) -> Self {
        Self {
            readers: HashMap::new(),
            writers: HashMap::new(),
            next_id: 0,
            id_limit,
        }
    }

    /// Effective ceiling: the configured one, bounded by the id space.
    fn capacity(&self, configured: usize) -> usize {
        configured.min(self.id_limit as usize)
    }

    fn outstanding(&self) -> usize {
        self.readers.len() + self.writers.len()
    }

    /// Grants a new request in `mode` has to wait for.
    fn conflicts(&self, mode: LockModeKind) -> Vec<Completion> {
        match mode {
            LockModeKind::Read => self.writers.values().cloned().collect(),
            LockModeKind::Write => self
                .readers
                .values()
                .chain(self.writers.values())
                .cloned()
                .collect(),
        }
    }

    /// Next free id, or `None` once every id in the space is outstanding.
    fn allocate_id(&mut self) -> Option<u32> {
        for _ in 0..self.id_limit {
            let id = self.next_id;
            self.next_id = (self.next_id + 1) % self.id_limit;
            if !self.readers.contains_key(&id) && !self.writers.contains_key(&id) {
                return Some(id);
            }
        }
        None
    }

    fn set_mut(&mut self, mode: LockModeKind) -> &mut HashMap<u32, Completion> {
        match mode {
            LockModeKind::Read => &mut self.readers,
            LockModeKind::Write => &mut self.writers,
        }
    }
}

/// Read/write lock for one key.
///
/// Readers never wait on other readers. A writer waits for every grant that
/// was outstanding when it was admitted, and every later request waits for
/// that writer. Requests are not globally FIFO: a reader admitted after a
/// queued writer can be granted first if the writers in its own snapshot
/// drain first.
pub struct Lock {
    key: String,
    config: LockConfig,
    grants: Mutex<Grants>,
}

impl Lock {
    /// Create a standalone lock for `key`, outside any table.
    pub fn new(key: impl Into<String>, config: LockConfig) -> Arc<Self> {
        Self::with_id_space(key, config, ID_LIMIT)
    }

    fn with_id_space(key: impl Into<String>, config: LockConfig, id_limit: u32) -> Arc<Self> {
        Arc::new(Self {
            key: key.into(),
            config,
            grants: Mutex::new(Grants::new(id_limit)),
        })
    }

    /// Key this lock guards.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Defaults this lock was created with.
    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Read grants admitted and not yet released, including waiting ones.
    pub fn active_readers(&self) -> usize {
        self.grants.lock().readers.len()
    }

    /// Write grants admitted and not yet released, including waiting ones.
    pub fn active_writers(&self) -> usize {
        self.grants.lock().writers.len()
    }

    /// Read and write grants currently admitted, granted or still waiting.
    pub fn outstanding(&self) -> usize {
        self.grants.lock().outstanding()
    }

    /// Acquire a shared grant with the lock's default timeout.
    pub async fn read(self: &Arc<Self>) -> LockResult<ReadLockHandle> {
        self.acquire(AcquireOptions::default()).await
    }

    /// Acquire a shared grant, overriding the default timeout for this call.
    pub async fn read_with(
        self: &Arc<Self>,
        options: AcquireOptions,
    ) -> LockResult<ReadLockHandle> {
        self.acquire(options).await
    }

    /// Acquire an exclusive grant with the lock's default timeout.
    pub async fn write(self: &Arc<Self>) -> LockResult<WriteLockHandle> {
        self.acquire(AcquireOptions::default()).await
    }

    /// Acquire an exclusive grant, overriding the default timeout for this call.
    pub async fn write_with(
        self: &Arc<Self>,
        options: AcquireOptions,
    ) -> LockResult<WriteLockHandle> {
        self.acquire(options).await
    }

    /// Take a shared grant only if no writer is outstanding.
    ///
    /// Returns `Ok(None)` without admitting anything when the request would
    /// have to wait.
    pub fn try_read(self: &Arc<Self>) -> LockResult<Option<ReadLockHandle>> {
        self.try_acquire()
    }

    /// Take an exclusive grant only if nothing else is outstanding.
    pub fn try_write(self: &Arc<Self>) -> LockResult<Option<WriteLockHandle>> {
        self.try_acquire()
    }

    async fn acquire<M: LockMode>(
        self: &Arc<Self>,
        options: AcquireOptions,
    ) -> LockResult<LockHandle<M>> {
        let Some((handle, snapshot)) = self.admit::<M>(false)? else {
            unreachable!("blocking admission always registers a grant");
        };
        if snapshot.is_empty() {
            return Ok(handle);
        }

        let drained = signal::drained(snapshot);
        match options.effective_timeout(self.config.timeout) {
            None => drained.await,
            Some(limit) => {
                if tokio::time::timeout(limit, drained).await.is_err() {
                    return Err(self.expire(handle, limit));
                }
            }
        }

        trace!(key = %self.key, id = handle.id(), mode = %M::MODE, "lock granted");
        Ok(handle)
    }

    fn try_acquire<M: LockMode>(self: &Arc<Self>) -> LockResult<Option<LockHandle<M>>> {
        Ok(self.admit::<M>(true)?.map(|(handle, _)| handle))
    }

    /// Register a new grant and capture what it must wait for.
    ///
    /// With `only_if_free`, returns `Ok(None)` and registers nothing when the
    /// snapshot would be non-empty.
    #[allow(clippy::type_complexity)]
    fn admit<M: LockMode>(
        self: &Arc<Self>,
        only_if_free: bool,
    ) -> LockResult<Option<(LockHandle<M>, Vec<Completion>)>> {
        let mut grants = self.grants.lock();
        let limit = grants.capacity(self.config.max_locks_per_key);
        let exceeded = || LockError::CapacityExceeded {
            key: self.key.clone(),
            limit,
        };
        if grants.outstanding() >= limit {
            return Err(exceeded());
        }

        let snapshot = grants.conflicts(M::MODE);
        if only_if_free && !snapshot.is_empty() {
            return Ok(None);
        }

        let id = grants.allocate_id().ok_or_else(exceeded)?;
        let (completer, completion) = signal::channel();
        grants.set_mut(M::MODE).insert(id, completion);
        drop(grants);

        trace!(
            key = %self.key,
            id,
            mode = %M::MODE,
            waiting_on = snapshot.len(),
            "lock admitted"
        );
        Ok(Some((LockHandle::new(Arc::clone(self), id, completer), snapshot)))
    }

    fn expire<M: LockMode>(&self, handle: LockHandle<M>, limit: Duration) -> LockError {
        debug!(
            key = %self.key,
            id = handle.id(),
            mode = %M::MODE,
            timeout_ms = limit.as_millis(),
            "lock wait timed out"
        );
        handle.timeout();
        LockError::AcquisitionTimeout {
            key: self.key.clone(),
            mode: M::MODE,
            timeout: limit,
        }
    }

    /// Remove a grant from the active set. Unknown ids are ignored.
    pub(crate) fn deregister(&self, mode: LockModeKind, id: u32) {
        let removed = self.grants.lock().set_mut(mode).remove(&id).is_some();
        if removed {
            trace!(key = %self.key, id, mode = %mode, "lock released");
        }
    }
}

impl fmt::Debug for Lock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let grants = self.grants.lock();
        f.debug_struct("Lock")
            .field("key", &self.key)
            .field("readers", &grants.readers.len())
            .field("writers", &grants.writers.len())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, assert_ready_ok, task};

    fn lock() -> Arc<Lock> {
        Lock::new("unit", LockConfig::default())
    }

    #[test]
    fn readers_do_not_wait_on_readers() {
        let lock = lock();
        let a = assert_ready_ok!(task::spawn(lock.read()).poll());
        let b = assert_ready_ok!(task::spawn(lock.read()).poll());
        assert_ne!(a.id(), b.id());
        assert_eq!(lock.active_readers(), 2);
        assert_eq!(lock.outstanding(), 2);
    }

    #[test]
    fn writer_snapshot_excludes_later_readers() {
        let lock = lock();
        let first = lock.try_read().unwrap().unwrap();

        let mut writer = task::spawn(lock.write());
        assert_pending!(writer.poll());

        // Admitted after the writer, so it waits on the writer instead.
        let mut late = task::spawn(lock.read());
        assert_pending!(late.poll());

        first.release();
        let writer = assert_ready_ok!(writer.poll());
        assert_pending!(late.poll());

        writer.release();
        assert_ready_ok!(late.poll());
    }

    #[test]
    fn reader_only_snapshots_writers() {
        let lock = lock();
        let writer = lock.try_write().unwrap().unwrap();
        let mut reader = task::spawn(lock.read());
        assert_pending!(reader.poll());
        assert_eq!(lock.active_readers(), 1);
        assert_eq!(lock.active_writers(), 1);

        writer.release();
        assert_ready_ok!(reader.poll());
        assert_eq!(lock.active_writers(), 0);
    }

    #[test]
    fn dropping_a_waiting_request_deregisters_it() {
        let lock = lock();
        let writer = lock.try_write().unwrap().unwrap();
        {
            let mut waiting = task::spawn(lock.write());
            assert_pending!(waiting.poll());
            assert_eq!(lock.active_writers(), 2);
        }
        assert_eq!(lock.active_writers(), 1);
        writer.release();
        assert_eq!(lock.outstanding(), 0);
    }

    #[test]
    fn try_acquire_admits_nothing_when_it_would_wait() {
        let lock = lock();
        let reader = lock.try_read().unwrap().unwrap();
        assert!(lock.try_write().unwrap().is_none());
        assert_eq!(lock.outstanding(), 1);
        assert!(lock.try_read().unwrap().is_some());
        drop(reader);
        assert_eq!(lock.outstanding(), 0);
    }

    #[test]
    fn capacity_is_checked_before_waiting() {
        let lock = Lock::new("small", LockConfig::default().with_max_locks_per_key(2));
        let _a = lock.try_read().unwrap().unwrap();
        let _b = lock.try_read().unwrap().unwrap();

        let err = lock.try_read().unwrap_err();
        assert_eq!(
            err,
            LockError::CapacityExceeded {
                key: "small".to_string(),
                limit: 2
            }
        );
        let mut blocked = task::spawn(lock.write());
        assert!(assert_ready!(blocked.poll()).unwrap_err().is_capacity());
    }

    #[test]
    fn ids_wrap_and_skip_outstanding_grants() {
        let mut grants = Grants::new(ID_LIMIT);
        let (_, completion) = signal::channel();
        grants.readers.insert(0, completion);
        grants.next_id = ID_LIMIT - 1;

        assert_eq!(grants.allocate_id(), Some(ID_LIMIT - 1));
        assert_eq!(grants.allocate_id(), Some(1));
        assert_eq!(grants.next_id, 2);
    }

    #[test]
    fn full_id_space_yields_no_id() {
        let mut grants = Grants::new(4);
        for id in 0..4 {
            let (_, completion) = signal::channel();
            grants.set_mut(LockModeKind::Read).insert(id, completion);
        }
        grants.next_id = 2;

        assert_eq!(grants.allocate_id(), None);
        assert_eq!(grants.capacity(2_000_000), 4);
        assert_eq!(grants.capacity(3), 3);
    }

    #[test]
    fn capacity_is_bounded_by_the_id_space() {
        let config = LockConfig::default().with_max_locks_per_key(2_000_000);
        let lock = Lock::with_id_space("huge", config, 4);
        let held: Vec<_> = (0..4).map(|_| lock.try_read().unwrap().unwrap()).collect();

        let err = lock.try_read().unwrap_err();
        assert_eq!(
            err,
            LockError::CapacityExceeded {
                key: "huge".to_string(),
                limit: 4
            }
        );
        let mut blocked = task::spawn(lock.write());
        assert!(assert_ready!(blocked.poll()).unwrap_err().is_capacity());

        // The grants mutex is free again: releases and counters still work.
        drop(held);
        assert_eq!(lock.outstanding(), 0);
        assert!(lock.try_write().unwrap().is_some());
    }

    #[test]
    fn timed_out_grant_counts_as_drained() {
        let lock = lock();
        let writer = lock.try_write().unwrap().unwrap();
        let mut reader = task::spawn(lock.read());
        assert_pending!(reader.poll());

        writer.timeout();
        assert_ready_ok!(reader.poll());
    }
}
