//! Stress tests for JsonDB.
//!
//! These helpers drive one database from many threads at once.

use jsondb_core::{Database, ModifyOutcome, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    #[allow(clippy::cast_precision_loss)]
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {name} ===");
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of threads.
    pub threads: usize,
    /// Operations per thread.
    pub operations: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            operations: 100,
        }
    }
}

/// Increments a shared counter document with `first_and_modify` from every
/// thread. The final count equals the number of successful operations if
/// modifications are atomic.
///
/// Returns the result and the final counter value.
pub fn concurrent_increments(db: &Database, config: &StressConfig) -> (StressTestResult, i64) {
    let counters = db.collection("counters").expect("Failed to open collection");
    counters
        .put("hits", &Value::from_iter([("n", 0)]))
        .expect("Failed to seed counter");
    let query = counters.all().expect("Failed to build query");

    let ok = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let start = Instant::now();
    thread::scope(|scope| {
        for _ in 0..config.threads {
            scope.spawn(|| {
                for _ in 0..config.operations {
                    let result = query.first_and_modify(|doc| {
                        let n = doc.get("n").and_then(Value::as_i64).unwrap_or(0);
                        doc.insert("n", n + 1);
                        ModifyOutcome::UPDATE
                    });
                    match result {
                        Ok(_) => ok.fetch_add(1, Ordering::Relaxed),
                        Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
            });
        }
    });

    let result = StressTestResult::new(
        ok.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    );
    let count = counters
        .get("hits")
        .expect("Failed to read counter")
        .and_then(|doc| doc.get("n").and_then(Value::as_i64))
        .unwrap_or(-1);
    (result, count)
}

/// Runs readers counting a collection while one writer inserts into it.
///
/// Every count a reader observes must lie between the initial and final
/// sizes and never decrease for one reader. Returns the number of
/// violations seen.
pub fn readers_during_writes(db: &Database, config: &StressConfig) -> usize {
    let items = db.collection("items").expect("Failed to open collection");
    let query = items.all().expect("Failed to build query");
    let total = config.operations;
    let violations = AtomicUsize::new(0);

    thread::scope(|scope| {
        scope.spawn(|| {
            for i in 0..total {
                let id = i64::try_from(i).expect("index fits i64");
                items
                    .put(id, &Value::from_iter([("i", id)]))
                    .expect("Failed to insert");
            }
        });
        for _ in 0..config.threads {
            scope.spawn(|| {
                let mut last = 0;
                for _ in 0..config.operations {
                    let count = query.count().expect("Failed to count");
                    if count < last || count > total {
                        violations.fetch_add(1, Ordering::Relaxed);
                    }
                    last = count;
                }
            });
        }
    });
    violations.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::with_temp_db;

    #[test]
    fn increments_are_atomic() {
        with_temp_db(|db| {
            let config = StressConfig {
                threads: 4,
                operations: 25,
            };
            let (result, count) = concurrent_increments(db, &config);
            assert_eq!(result.failed_ops, 0);
            assert_eq!(count, 100);
        });
    }

    #[test]
    fn readers_see_monotonic_snapshots() {
        with_temp_db(|db| {
            let config = StressConfig {
                threads: 3,
                operations: 50,
            };
            assert_eq!(readers_during_writes(db, &config), 0);
        });
    }
}
