use async_lock::RwLock;
use criterion::{criterion_group, criterion_main, Criterion};
use named_lock::LockTable;
use std::sync::Arc;
use tokio::runtime::Runtime;

const KEYS: [&str; 4] = ["a", "b", "c", "d"];
const TASKS: usize = 8;
const OPS_PER_TASK: usize = 1000;

fn bench_write_contention(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("write_contention");

    // Single RwLock -- every key serializes on one lock
    group.bench_function("single_rwlock", |b| {
        b.to_async(&rt).iter(|| async {
            let lock = Arc::new(RwLock::new(()));
            let mut handles = vec![];
            for _ in 0..KEYS.len() {
                let l = lock.clone();
                handles.push(tokio::spawn(async move {
                    for _ in 0..OPS_PER_TASK {
                        let _guard = l.write().await;
                    }
                }));
            }
            for h in handles {
                h.await.unwrap();
            }
        });
    });

    // Named locks -- each writer contends only on its own key
    group.bench_function("named_lock", |b| {
        b.to_async(&rt).iter(|| async {
            let table = Arc::new(LockTable::new());
            let mut handles = vec![];
            for key in KEYS {
                let t = table.clone();
                handles.push(tokio::spawn(async move {
                    for _ in 0..OPS_PER_TASK {
                        t.write_lock(key).await.unwrap().release();
                    }
                }));
            }
            for h in handles {
                h.await.unwrap();
            }
        });
    });

    group.finish();
}

fn bench_read_heavy(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("read_heavy");

    group.bench_function("single_rwlock", |b| {
        b.to_async(&rt).iter(|| async {
            let lock = Arc::new(RwLock::new(()));
            let mut handles = vec![];
            for task_id in 0..TASKS {
                let l = lock.clone();
                handles.push(tokio::spawn(async move {
                    for i in 0..OPS_PER_TASK {
                        if (task_id + i) % 10 == 0 {
                            let _guard = l.write().await;
                        } else {
                            let _guard = l.read().await;
                        }
                    }
                }));
            }
            for h in handles {
                h.await.unwrap();
            }
        });
    });

    group.bench_function("named_lock", |b| {
        b.to_async(&rt).iter(|| async {
            let table = Arc::new(LockTable::new());
            let mut handles = vec![];
            for task_id in 0..TASKS {
                let t = table.clone();
                handles.push(tokio::spawn(async move {
                    for i in 0..OPS_PER_TASK {
                        if (task_id + i) % 10 == 0 {
                            t.write_lock("shared").await.unwrap().release();
                        } else {
                            t.read_lock("shared").await.unwrap().release();
                        }
                    }
                }));
            }
            for h in handles {
                h.await.unwrap();
            }
        });
    });

    group.finish();
}

fn bench_uncontended(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let table = LockTable::new();

    c.bench_function("uncontended_write", |b| {
        b.to_async(&rt)
            .iter(|| async { table.write_lock("solo").await.unwrap().release() });
    });

    c.bench_function("try_read", |b| {
        b.iter(|| table.try_read_lock("solo").unwrap());
    });
}

criterion_group!(benches, bench_write_contention, bench_read_heavy, bench_uncontended);
criterion_main!(benches);
