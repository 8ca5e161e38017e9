use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::config::{AcquireOptions, LockConfig};
use crate::error::LockResult;
use crate::handle::{ReadLockHandle, WriteLockHandle};
use crate::lock::Lock;

/// Name of a lockable resource.
///
/// A missing key (`None`) is the empty string, so untyped callers all share
/// one lock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LockKey(String);

impl LockKey {
    /// The normalized key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Unwrap into the owned key text.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LockKey {
    fn from(key: &str) -> Self {
        Self(key.to_owned())
    }
}

impl From<String> for LockKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&String> for LockKey {
    fn from(key: &String) -> Self {
        Self(key.clone())
    }
}

impl<K: Into<LockKey>> From<Option<K>> for LockKey {
    fn from(key: Option<K>) -> Self {
        key.map(Into::into).unwrap_or_default()
    }
}

/// Map from key to an independent [`Lock`], created on first use with the
/// table's [`LockConfig`].
///
/// Locks are never removed implicitly; call [`prune_idle`](Self::prune_idle)
/// if the key space is unbounded.
pub struct LockTable {
    config: LockConfig,
    locks: Mutex<HashMap<String, Arc<Lock>>>,
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new()
    }
}

impl LockTable {
    /// Table with the default [`LockConfig`]: no timeout, 1024 grants per key.
    pub fn new() -> Self {
        Self::with_config(LockConfig::default())
    }

    /// Table whose locks all start from `config`.
    pub fn with_config(config: LockConfig) -> Self {
        Self {
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Defaults handed to every lock this table creates.
    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// The lock for `key`, creating it if this is the first time it is seen.
    pub fn lock(&self, key: impl Into<LockKey>) -> Arc<Lock> {
        let mut locks = self.locks.lock();
        let lock = locks
            .entry(key.into().into_string())
            .or_insert_with_key(|key| Lock::new(key.as_str(), self.config));
        Arc::clone(lock)
    }

    /// Resolves once a shared grant on `key` is admitted and every writer
    /// outstanding at that moment has released.
    pub async fn read_lock(&self, key: impl Into<LockKey>) -> LockResult<ReadLockHandle> {
        self.read_lock_with(key, AcquireOptions::default()).await
    }

    /// Like [`read_lock`](Self::read_lock), with a per-call timeout override.
    pub async fn read_lock_with(
        &self,
        key: impl Into<LockKey>,
        options: AcquireOptions,
    ) -> LockResult<ReadLockHandle> {
        let lock = self.lock(key);
        lock.read_with(options).await
    }

    /// Resolves once an exclusive grant on `key` is admitted and every reader
    /// and writer outstanding at that moment has released.
    pub async fn write_lock(&self, key: impl Into<LockKey>) -> LockResult<WriteLockHandle> {
        self.write_lock_with(key, AcquireOptions::default()).await
    }

    /// Like [`write_lock`](Self::write_lock), with a per-call timeout override.
    pub async fn write_lock_with(
        &self,
        key: impl Into<LockKey>,
        options: AcquireOptions,
    ) -> LockResult<WriteLockHandle> {
        let lock = self.lock(key);
        lock.write_with(options).await
    }

    /// Shared grant on `key` only if no writer is outstanding; `Ok(None)`
    /// otherwise, with nothing admitted.
    pub fn try_read_lock(&self, key: impl Into<LockKey>) -> LockResult<Option<ReadLockHandle>> {
        self.lock(key).try_read()
    }

    /// Exclusive grant on `key` only if nothing is outstanding; `Ok(None)`
    /// otherwise, with nothing admitted.
    pub fn try_write_lock(&self, key: impl Into<LockKey>) -> LockResult<Option<WriteLockHandle>> {
        self.lock(key).try_write()
    }

    /// Number of keys with a lock in the table.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    /// `true` if no key has been seen yet, or every lock was pruned.
    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }

    /// Whether `key` already has a lock. Does not create one.
    pub fn contains_key(&self, key: impl Into<LockKey>) -> bool {
        self.locks.lock().contains_key(key.into().as_str())
    }

    /// Keys with a lock in the table, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.locks.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Drop every lock with no outstanding grants that nobody outside the
    /// table still references. Returns how many were removed.
    pub fn prune_idle(&self) -> usize {
        let mut locks = self.locks.lock();
        let before = locks.len();
        locks.retain(|_, lock| Arc::strong_count(lock) > 1 || lock.outstanding() > 0);
        let pruned = before - locks.len();
        if pruned > 0 {
            debug!(pruned, remaining = locks.len(), "pruned idle locks");
        }
        pruned
    }
}

impl fmt::Debug for LockTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockTable")
            .field("config", &self.config)
            .field("keys", &self.len())
            .finish()
    }
}
