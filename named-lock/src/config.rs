//! Lock table configuration and per-call acquisition options

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default ceiling on simultaneously outstanding grants for one key.
pub const DEFAULT_MAX_LOCKS_PER_KEY: usize = 1024;

/// Defaults applied to every [`Lock`](crate::Lock) a table creates.
///
/// Deserializes from the wire shape
/// `{ "timeout": <ms>, "maximumNumberOfLocks": <n> }`, where a timeout that is
/// absent, `null` or `<= 0` means "wait indefinitely". Fractional
/// milliseconds round up to the next whole millisecond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// How long a request may wait for earlier grants to drain
    #[serde(with = "millis")]
    pub timeout: Option<Duration>,

    /// Outstanding grants allowed per key before new requests are rejected
    #[serde(rename = "maximumNumberOfLocks")]
    pub max_locks_per_key: usize,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            max_locks_per_key: DEFAULT_MAX_LOCKS_PER_KEY,
        }
    }
}

impl LockConfig {
    /// Set the default timeout. A zero duration means no timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = non_zero(timeout);
        self
    }

    /// Wait indefinitely by default.
    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Set the per-key grant ceiling
    pub fn with_max_locks_per_key(mut self, max: usize) -> Self {
        self.max_locks_per_key = max;
        self
    }
}

/// Per-call overrides for `read_lock_with` / `write_lock_with`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquireOptions {
    /// `None` inherits the lock's default. `Some(Duration::ZERO)` waits
    /// indefinitely for this call only.
    pub timeout: Option<Duration>,
}

impl AcquireOptions {
    /// Options that inherit every default from the lock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the timeout for this call. Zero waits indefinitely.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Timeout in force for this call given the lock's default.
    pub(crate) fn effective_timeout(&self, default: Option<Duration>) -> Option<Duration> {
        match self.timeout {
            Some(timeout) => non_zero(timeout),
            None => default,
        }
    }
}

impl From<Duration> for AcquireOptions {
    fn from(timeout: Duration) -> Self {
        Self::new().with_timeout(timeout)
    }
}

fn non_zero(timeout: Duration) -> Option<Duration> {
    (!timeout.is_zero()).then_some(timeout)
}

/// `Option<Duration>` as milliseconds, `<= 0` meaning none.
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        let ms = value.map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
        s.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let ms = Option::<f64>::deserialize(d)?;
        Ok(ms
            .filter(|ms| ms.is_finite() && *ms > 0.0)
            .map(|ms| Duration::from_millis(ms.ceil() as u64)))
    }
}
