//! Stress tests for Optimist.
//!
//! These harnesses hammer entities and transactions from many threads and
//! report how many operations went through and how many lost a race.

use crate::fixtures::Ledger;
use optimist_core::{CoreResult, Entity, Transaction};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone, Serialize)]
pub struct StressTestResult {
    /// Total operations attempted.
    pub total_ops: usize,
    /// Operations that published.
    pub successful_ops: usize,
    /// Operations that hit a conflict or abort.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
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
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Conflicts/aborts: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }

    /// Renders the result as JSON for CI artifacts.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Operations each thread performs.
    pub operations_per_thread: usize,
    /// Number of concurrent threads.
    pub threads: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations_per_thread: 1_000,
            threads: 4,
        }
    }
}

/// Outcome of [`stress_hot_spot_transactions`].
#[derive(Debug)]
pub struct HotSpotOutcome {
    /// Counts.
    pub result: StressTestResult,
    /// One private entity per thread, incremented only by that thread.
    pub private: Vec<Entity<i64>>,
}

/// Runs `threads` closures started together behind a barrier.
fn run_threads<F>(threads: usize, body: F) -> Duration
where
    F: Fn(usize) + Send + Sync + 'static,
{
    let body = Arc::new(body);
    let barrier = Arc::new(Barrier::new(threads));
    let start = Instant::now();

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let body = Arc::clone(&body);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                body(t);
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }
    let elapsed = start.elapsed();
    tracing::debug!(threads, ?elapsed, "stress run finished");
    elapsed
}

/// Increments `counter` from every thread, retrying each lost race.
///
/// Every thread lands exactly `operations_per_thread` increments, so the
/// counter must grow by `threads * operations_per_thread`. Failed ops count
/// the conflicts that forced a retry.
pub fn stress_counter(counter: &Entity<i64>, config: &StressConfig) -> StressTestResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let ops = config.operations_per_thread;

    let duration = {
        let counter = counter.clone();
        let successful = Arc::clone(&successful);
        let failed = Arc::clone(&failed);
        run_threads(config.threads, move |_| {
            let mut stage = counter.stage();
            for _ in 0..ops {
                while stage.modify(|n| n + 1).commit().is_err() {
                    failed.fetch_add(1, Ordering::Relaxed);
                }
                successful.fetch_add(1, Ordering::Relaxed);
            }
        })
    };

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        duration,
    )
}

/// Runs transfers on disjoint account pairs, one pair per thread.
///
/// Thread `t` owns accounts `2t` and `2t + 1`. No two transactions share a
/// participant, so none may abort.
///
/// # Panics
///
/// Panics if the ledger has fewer than `2 * threads` accounts.
pub fn stress_disjoint_transfers(ledger: &Ledger, config: &StressConfig) -> StressTestResult {
    assert!(
        ledger.accounts().len() >= 2 * config.threads,
        "ledger needs two accounts per thread"
    );
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let ops = config.operations_per_thread;

    let duration = {
        let ledger = ledger.clone();
        let successful = Arc::clone(&successful);
        let failed = Arc::clone(&failed);
        run_threads(config.threads, move |t| {
            for i in 0..ops {
                let (from, to) = if i % 2 == 0 {
                    (2 * t, 2 * t + 1)
                } else {
                    (2 * t + 1, 2 * t)
                };
                match ledger.transfer(from, to, 1) {
                    Ok(_) => successful.fetch_add(1, Ordering::Relaxed),
                    Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                };
            }
        })
    };

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        duration,
    )
}

/// Stages `+1` on the hot entity and on a private one.
fn hot_spot_step(hot: &Entity<i64>, private: &Entity<i64>) -> CoreResult<()> {
    let mut txn = Transaction::builder()
        .participant(hot)
        .participant(private)
        .build()?;
    txn.begin()?
        .modify(0, |n: &i64| n + 1)?
        .modify(1, |n: &i64| n + 1)?
        .commit()?;
    Ok(())
}

/// Runs two-participant transactions that all share `hot` as participant 0.
///
/// Each thread pairs `hot` with its own private entity. A transaction can
/// only fail on `hot`, before anything is published, so `hot` must grow by
/// exactly the number of successful transactions, and so must the sum of the
/// private entities. Aborted transactions are not retried.
pub fn stress_hot_spot_transactions(hot: &Entity<i64>, config: &StressConfig) -> HotSpotOutcome {
    let private: Vec<_> = (0..config.threads).map(|_| Entity::new(0_i64)).collect();
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let ops = config.operations_per_thread;

    let duration = {
        let hot = hot.clone();
        let private = private.clone();
        let successful = Arc::clone(&successful);
        let failed = Arc::clone(&failed);
        run_threads(config.threads, move |t| {
            for _ in 0..ops {
                match hot_spot_step(&hot, &private[t]) {
                    Ok(()) => successful.fetch_add(1, Ordering::Relaxed),
                    Err(e) => {
                        assert!(e.is_abort(), "unexpected error: {e}");
                        failed.fetch_add(1, Ordering::Relaxed)
                    }
                };
            }
        })
    };

    HotSpotOutcome {
        result: StressTestResult::new(
            successful.load(Ordering::Relaxed),
            failed.load(Ordering::Relaxed),
            duration,
        ),
        private,
    }
}

/// Reads `entity` from several threads while one writer toggles it.
///
/// Readers must only ever observe one of the two toggled values.
pub fn stress_readers_during_toggle(entity: &Entity<i64>, config: &StressConfig) -> StressTestResult {
    let start_value = entity.get();
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let ops = config.operations_per_thread;

    let duration = {
        let entity = entity.clone();
        let successful = Arc::clone(&successful);
        let failed = Arc::clone(&failed);
        run_threads(config.threads.max(2), move |t| {
            if t == 0 {
                let mut stage = entity.stage();
                stage.modify(|n| n + 1);
                for _ in 0..ops {
                    if stage.commit().and_then(|s| s.rollback()).is_err() {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            } else {
                for _ in 0..ops {
                    let value = entity.get();
                    if value == start_value || value == start_value + 1 {
                        successful.fetch_add(1, Ordering::Relaxed);
                    } else {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        })
    };

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        duration,
    )
}
