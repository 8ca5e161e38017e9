//! Named async read/write locks.
//!
//! A [`LockTable`] maps string keys to independent [`Lock`]s. Each lock lets
//! any number of readers in at once and gives writers exclusive access.
//! Acquisition returns a [`LockHandle`] that holds the grant until it is
//! released or dropped. Every request can carry a timeout, and each key has a
//! ceiling on outstanding grants beyond which requests fail immediately.
//!
//! **Runtime-agnostic waiting** — grants are signalled through [`async-lock`].
//! Timeouts use the tokio timer, so a request that has a timeout and actually
//! has to wait must be polled inside a tokio runtime.
//!
//! # Quick Start
//!
//! ```rust
//! use named_lock::LockTable;
//!
//! # tokio_test::block_on(async {
//! let table = LockTable::new();
//!
//! // Readers share a key
//! let a = table.read_lock("users").await?;
//! let b = table.read_lock("users").await?;
//!
//! // Other keys never contend
//! let other = table.write_lock("sessions").await?;
//!
//! a.release();
//! b.release();
//! other.release();
//!
//! let w = table.write_lock("users").await?;
//! w.release();
//! # Ok::<(), named_lock::LockError>(())
//! # }).unwrap();
//! ```
//!
//! # Timeouts and capacity
//!
//! ```rust
//! use named_lock::{AcquireOptions, LockConfig, LockTable};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let table = LockTable::with_config(
//!     LockConfig::default()
//!         .with_timeout(Duration::from_secs(5))
//!         .with_max_locks_per_key(64),
//! );
//!
//! let held = table.write_lock("config").await.unwrap();
//! let err = table
//!     .read_lock_with("config", AcquireOptions::from(Duration::from_millis(20)))
//!     .await
//!     .unwrap_err();
//! assert!(err.is_timeout());
//!
//! // The holder is unaffected by the waiter timing out
//! held.release();
//! # }
//! ```
//!
//! # Non-blocking acquisition
//!
//! ```rust
//! # use named_lock::LockTable;
//! let table = LockTable::new();
//! let writer = table.try_write_lock("k").unwrap().expect("uncontended");
//! assert!(table.try_read_lock("k").unwrap().is_none());
//! writer.release();
//! assert!(table.try_read_lock("k").unwrap().is_some());
//! ```
//!
//! # Ordering
//!
//! | Request | Waits for |
//! |---------|-----------|
//! | read    | writers outstanding when it was admitted |
//! | write   | readers and writers outstanding when it was admitted |
//!
//! Requests admitted later never extend an earlier request's wait.

mod config;
mod error;
mod handle;
mod lock;
mod mode;
mod signal;
mod table;

pub use config::{AcquireOptions, LockConfig, DEFAULT_MAX_LOCKS_PER_KEY};
pub use error::{LockError, LockResult};
pub use handle::{LockHandle, ReadLockHandle, WriteLockHandle};
pub use lock::Lock;
pub use mode::{LockMode, LockModeKind, ReadLocked, WriteLocked};
pub use table::{LockKey, LockTable};
