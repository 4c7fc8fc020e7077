//! Transport counters

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the producer and consumer sides
#[derive(Debug, Default)]
pub struct TransportMetrics {
    /// Packets decoded and dispatched
    packets_dispatched: AtomicU64,
    /// Packets dropped for a bad size, kind or shape
    packets_dropped: AtomicU64,
    /// Times the unread region was discarded after a framing error
    flushes: AtomicU64,
    /// Bytes released back to the producer
    bytes_consumed: AtomicU64,
    /// World updates whose clock went backwards
    clock_regressions: AtomicU64,
    /// Draw commands evicted by the store's capacity
    evictions: AtomicU64,
    /// Frames the producer could not fit into the ring
    producer_drops: AtomicU64,
}

/// Point-in-time copy of [`TransportMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub packets_dispatched: u64,
    pub packets_dropped: u64,
    pub flushes: u64,
    pub bytes_consumed: u64,
    pub clock_regressions: u64,
    pub evictions: u64,
    pub producer_drops: u64,
}

impl TransportMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_dispatch(&self) {
        self.packets_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drop(&self) {
        self.packets_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_consumed(&self, bytes: usize) {
        self.bytes_consumed.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_clock_regression(&self) {
        self.clock_regressions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_producer_drop(&self) {
        self.producer_drops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            packets_dispatched: self.packets_dispatched.load(Ordering::Relaxed),
            packets_dropped: self.packets_dropped.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            bytes_consumed: self.bytes_consumed.load(Ordering::Relaxed),
            clock_regressions: self.clock_regressions.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            producer_drops: self.producer_drops.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = TransportMetrics::new();
        metrics.record_dispatch();
        metrics.record_dispatch();
        metrics.record_drop();
        metrics.record_consumed(155);
        metrics.record_consumed(5);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.packets_dispatched, 2);
        assert_eq!(snapshot.packets_dropped, 1);
        assert_eq!(snapshot.bytes_consumed, 160);
        assert_eq!(snapshot.flushes, 0);
    }
}
