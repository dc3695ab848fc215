#![allow(dead_code)]

use enoki::{Queue, QueueKind};
use std::time::Duration;

/// Generous upper bound for waits that should succeed.
pub const TIMEOUT: Duration = Duration::from_secs(5);

pub fn trace_init() {
    use tracing_subscriber::filter::{EnvFilter, LevelFilter};
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::DEBUG.into())
        .from_env_lossy();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Returns a concurrent queue with exactly `workers` worker threads, for
/// tests whose kernels hold a worker until the test thread releases them.
pub fn queue(name: &'static str, workers: usize) -> Queue {
    Queue::builder()
        .name(name)
        .kind(QueueKind::Concurrent)
        .workers(workers)
        .build()
        .expect("failed to spawn test queue")
}
