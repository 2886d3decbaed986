//! # Metrics
//!
//! Lightweight operation counters, shared across threads via a cloneable
//! handle. Counters are plain atomics; reading them never blocks writers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone, Default)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Default)]
struct MetricsInner {
    // Write metrics
    updates: AtomicU64,
    removals: AtomicU64,

    // Query metrics
    rank_queries: AtomicU64,
    range_queries: AtomicU64,

    // Storage metrics
    store_writes: AtomicU64,
    store_bytes: AtomicU64,
    reload_entries: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_update(&self) {
        self.inner.updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_removal(&self) {
        self.inner.removals.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rank_query(&self) {
        self.inner.rank_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_range_query(&self) {
        self.inner.range_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_write(&self, bytes: u64) {
        self.inner.store_writes.fetch_add(1, Ordering::Relaxed);
        self.inner.store_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_reload(&self, entries: u64) {
        self.inner.reload_entries.fetch_add(entries, Ordering::Relaxed);
    }

    /// Consistent-enough point-in-time view of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            updates: self.inner.updates.load(Ordering::Relaxed),
            removals: self.inner.removals.load(Ordering::Relaxed),
            rank_queries: self.inner.rank_queries.load(Ordering::Relaxed),
            range_queries: self.inner.range_queries.load(Ordering::Relaxed),
            store_writes: self.inner.store_writes.load(Ordering::Relaxed),
            store_bytes: self.inner.store_bytes.load(Ordering::Relaxed),
            reload_entries: self.inner.reload_entries.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time counter values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub updates: u64,
    pub removals: u64,
    pub rank_queries: u64,
    pub range_queries: u64,
    pub store_writes: u64,
    pub store_bytes: u64,
    pub reload_entries: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = Metrics::new();
        metrics.record_update();
        metrics.record_update();
        metrics.record_store_write(24);
        metrics.record_store_write(16);

        let snap = metrics.snapshot();
        assert_eq!(snap.updates, 2);
        assert_eq!(snap.store_writes, 2);
        assert_eq!(snap.store_bytes, 40);
    }

    #[test]
    fn test_clone_shares_state() {
        let metrics = Metrics::new();
        let other = metrics.clone();
        other.record_removal();
        assert_eq!(metrics.snapshot().removals, 1);
    }
}
