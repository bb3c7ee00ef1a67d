//! Stress tests for the node repository.
//!
//! These runs hammer one store from many threads and check that cached
//! reads never fall behind a write that already returned.

use crate::fixtures::{json_node, TestDatabase};
use noderepo_core::{Config, DatabaseClient, Generation, NodeState};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
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
    /// Reads that observed data older than a completed write.
    pub stale_reads: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, stale_reads: usize, duration: Duration) -> Self {
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
            stale_reads,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the run.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Stale reads: {}", self.stale_reads);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Writes per writer thread.
    pub operations: usize,
    /// Number of writer threads, each with its own client.
    pub writers: usize,
    /// Number of reader threads, each with its own client.
    pub readers: usize,
    /// Whether clients cache reads.
    pub use_cache: bool,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 200,
            writers: 4,
            readers: 4,
            use_cache: true,
        }
    }
}

/// Runs concurrent writers and readers, each with its own client over one
/// shared store, like separate processes.
///
/// Each writer adds uniquely named nodes, then immediately reads them back
/// through its own client; a missing node counts as a stale read. Readers
/// list all nodes in a loop and count a stale read whenever a session is
/// older than one they were handed earlier.
pub fn stress_invalidation(config: &StressConfig) -> StressTestResult {
    let test_db = TestDatabase::new();
    let client_config = Config::new().use_cache(config.use_cache);
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let stale = Arc::new(AtomicUsize::new(0));
    let done = Arc::new(AtomicBool::new(false));

    let start = Instant::now();

    let readers: Vec<_> = (0..config.readers)
        .map(|_| {
            let client = test_db.reopen(&client_config);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let stale = Arc::clone(&stale);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut last = Generation::default();
                while !done.load(Ordering::SeqCst) {
                    let generation = match client.database().session() {
                        Ok(session) => session.generation(),
                        Err(_) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                            continue;
                        }
                    };
                    if generation < last {
                        stale.fetch_add(1, Ordering::Relaxed);
                    }
                    last = generation;
                    match client.read_nodes(&[]) {
                        Ok(_) => successful.fetch_add(1, Ordering::Relaxed),
                        Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
            })
        })
        .collect();

    let writers: Vec<_> = (0..config.writers)
        .map(|w| {
            let client = test_db.reopen(&client_config);
            let operations = config.operations;
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let stale = Arc::clone(&stale);
            thread::spawn(move || {
                for i in 0..operations {
                    let hostname = format!("writer{w}-host{i}");
                    if write_then_read(&client, &hostname, &stale) {
                        successful.fetch_add(1, Ordering::Relaxed);
                    } else {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    for writer in writers {
        let _ = writer.join();
    }
    done.store(true, Ordering::SeqCst);
    for reader in readers {
        let _ = reader.join();
    }

    StressTestResult::new(
        successful.load(Ordering::SeqCst),
        failed.load(Ordering::SeqCst),
        stale.load(Ordering::SeqCst),
        start.elapsed(),
    )
}

fn write_then_read(client: &DatabaseClient, hostname: &str, stale: &AtomicUsize) -> bool {
    let node = json_node(hostname, "stress");
    if client.add_nodes_in_state(&[node], NodeState::Ready).is_err() {
        return false;
    }
    match client.read_node(hostname, &[NodeState::Ready]) {
        Ok(Some(_)) => true,
        Ok(None) => {
            stale.fetch_add(1, Ordering::Relaxed);
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> StressConfig {
        StressConfig {
            operations: 50,
            writers: 3,
            readers: 3,
            use_cache: true,
        }
    }

    #[test]
    fn cached_clients_never_read_stale_data() {
        let result = stress_invalidation(&small());
        assert_eq!(result.stale_reads, 0);
        assert_eq!(result.failed_ops, 0);
        assert!(result.successful_ops >= 150);
    }

    #[test]
    fn uncached_clients_never_read_stale_data() {
        let config = StressConfig {
            use_cache: false,
            ..small()
        };
        let result = stress_invalidation(&config);
        assert_eq!(result.stale_reads, 0);
        assert_eq!(result.failed_ops, 0);
    }
}
