//! A toy cache server guarding per-key mutation with named locks.
//!
//! Readers of a cache entry run side by side; a refresh of one entry takes
//! the write lock for that key only, so other entries stay readable. Lookups
//! carry a short timeout and report when an entry is busy.
//!
//! Run with: `RUST_LOG=named_lock=trace cargo run --example cache_server`

use named_lock::{AcquireOptions, LockConfig, LockTable};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    version: u64,
}

struct Cache {
    locks: LockTable,
    entries: Mutex<HashMap<String, Entry>>,
}

impl Cache {
    fn new() -> Self {
        Self {
            locks: LockTable::with_config(
                LockConfig::default()
                    .with_timeout(Duration::from_secs(1))
                    .with_max_locks_per_key(128),
            ),
            entries: Mutex::new(HashMap::new()),
        }
    }

    async fn get(&self, key: &str) -> Option<Entry> {
        let options = AcquireOptions::from(Duration::from_millis(20));
        match self.locks.read_lock_with(key, options).await {
            Ok(guard) => {
                let entry = self.entries.lock().get(key).cloned();
                guard.release();
                entry
            }
            Err(err) => {
                println!("  get {key}: {err}");
                None
            }
        }
    }

    async fn refresh(&self, key: &str, value: String) {
        let guard = self.locks.write_lock(key).await.unwrap();
        // Simulate a slow upstream fetch while holding the key.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let mut entries = self.entries.lock();
        let version = entries.get(key).map_or(0, |e| e.version) + 1;
        entries.insert(key.to_string(), Entry { value, version });
        drop(entries);
        guard.release();
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cache = Arc::new(Cache::new());
    for key in ["alpha", "beta", "gamma"] {
        cache.refresh(key, format!("{key}-initial")).await;
    }

    let mut handles = vec![];

    // One slow refresh on "alpha" while everyone reads
    {
        let c = cache.clone();
        handles.push(tokio::spawn(async move {
            c.refresh("alpha", "alpha-fresh".into()).await;
            println!("refreshed alpha");
        }));
    }

    for reader in 0..4 {
        let c = cache.clone();
        handles.push(tokio::spawn(async move {
            for key in ["alpha", "beta", "gamma"] {
                match c.get(key).await {
                    Some(entry) => println!(
                        "reader {reader}: {key} = {} (v{})",
                        entry.value, entry.version
                    ),
                    None => println!("reader {reader}: {key} busy"),
                }
            }
        }));
    }

    for h in handles {
        h.await.unwrap();
    }

    let final_alpha = cache.get("alpha").await;
    println!("\nfinal alpha: {final_alpha:?}");
    println!("keys with locks: {:?}", cache.locks.keys());
}
