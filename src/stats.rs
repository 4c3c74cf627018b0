use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::{self, Duration};
use tracing::info;

#[derive(Debug)]
pub struct StatsCollector {
    total_queries: AtomicU64,
    blocked_queries: AtomicU64,
    forwarded_queries: AtomicU64,
    upstream_failures: AtomicU64,

    refresh_ok: AtomicU64,
    refresh_failed: AtomicU64,

    log_interval: Duration,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub total_queries: u64,
    pub blocked_queries: u64,
    pub forwarded_queries: u64,
    pub upstream_failures: u64,
    pub refresh_ok: u64,
    pub refresh_failed: u64,
}

impl StatsCollector {
    /// Creates a collector without the periodic dump task.
    pub fn new(log_interval_sec: u64) -> Arc<Self> {
        Arc::new(Self {
            total_queries: AtomicU64::new(0),
            blocked_queries: AtomicU64::new(0),
            forwarded_queries: AtomicU64::new(0),
            upstream_failures: AtomicU64::new(0),
            refresh_ok: AtomicU64::new(0),
            refresh_failed: AtomicU64::new(0),
            log_interval: Duration::from_secs(log_interval_sec.max(1)),
        })
    }

    /// Spawns the background task that logs a summary every interval.
    pub fn spawn_logger(self: &Arc<Self>) {
        let stats = self.clone();
        tokio::spawn(async move {
            stats.run_logger().await;
        });
    }

    pub fn inc_queries(&self) {
        self.total_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_blocked(&self) {
        self.blocked_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_forwarded(&self) {
        self.forwarded_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_upstream_failure(&self) {
        self.upstream_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_refresh(&self, ok: bool) {
        let counter = if ok {
            &self.refresh_ok
        } else {
            &self.refresh_failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_queries: self.total_queries.load(Ordering::Relaxed),
            blocked_queries: self.blocked_queries.load(Ordering::Relaxed),
            forwarded_queries: self.forwarded_queries.load(Ordering::Relaxed),
            upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
            refresh_ok: self.refresh_ok.load(Ordering::Relaxed),
            refresh_failed: self.refresh_failed.load(Ordering::Relaxed),
        }
    }

    async fn run_logger(&self) {
        let mut interval = time::interval(self.log_interval);
        loop {
            interval.tick().await;
            self.dump_stats();
        }
    }

    fn dump_stats(&self) {
        let s = self.get_snapshot();
        info!(
            "STATS DUMP: Total: {}, Blocked: {} ({:.1}%), Forwarded: {}, UpstreamFailures: {}, Refreshes: {} ok / {} failed",
            s.total_queries,
            s.blocked_queries,
            if s.total_queries > 0 {
                (s.blocked_queries as f64 / s.total_queries as f64) * 100.0
            } else {
                0.0
            },
            s.forwarded_queries,
            s.upstream_failures,
            s.refresh_ok,
            s.refresh_failed
        );
    }
}
