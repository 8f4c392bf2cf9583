//! # SoloMQ Metrics
//!
//! Lock-free counters updated on the request path. Every update is a single atomic
//! operation; nothing here allocates or blocks. There is no exporter: the server logs a
//! [`MetricsSnapshot`] when a connection closes and at shutdown.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Ensure hot counters are cache-line aligned to prevent false sharing
#[repr(align(64))]
#[derive(Debug, Default)]
struct CacheLineAligned<T>(T);

#[derive(Debug, Default)]
pub struct BrokerMetrics {
    active_connections: CacheLineAligned<AtomicUsize>,
    produce_requests: CacheLineAligned<AtomicU64>,
    fetch_requests: CacheLineAligned<AtomicU64>,
    bytes_appended: AtomicU64,
    records_fetched: AtomicU64,
    unknown_requests: AtomicU64,
    error_count: AtomicU64,
}

impl BrokerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn connection_opened(&self) {
        self.active_connections.0.fetch_add(1, Ordering::AcqRel);
    }

    #[inline(always)]
    pub fn connection_closed(&self) {
        self.active_connections.0.fetch_sub(1, Ordering::AcqRel);
    }

    #[inline(always)]
    pub fn record_produce(&self, payload_bytes: u64) {
        self.produce_requests.0.fetch_add(1, Ordering::Release);
        self.bytes_appended.fetch_add(payload_bytes, Ordering::Release);
    }

    #[inline(always)]
    pub fn record_fetch(&self, records: u64) {
        self.fetch_requests.0.fetch_add(1, Ordering::Release);
        self.records_fetched.fetch_add(records, Ordering::Release);
    }

    pub fn unknown_request(&self) {
        self.unknown_requests.fetch_add(1, Ordering::Release);
    }

    pub fn error_occurred(&self) {
        self.error_count.fetch_add(1, Ordering::Release);
    }

    #[inline(always)]
    pub fn active_connections(&self) -> usize {
        self.active_connections.0.load(Ordering::Acquire)
    }

    pub fn total_requests(&self) -> u64 {
        self.produce_requests.0.load(Ordering::Acquire)
            + self.fetch_requests.0.load(Ordering::Acquire)
            + self.unknown_requests.load(Ordering::Acquire)
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_connections: self.active_connections(),
            produce_requests: self.produce_requests.0.load(Ordering::Acquire),
            fetch_requests: self.fetch_requests.0.load(Ordering::Acquire),
            bytes_appended: self.bytes_appended.load(Ordering::Acquire),
            records_fetched: self.records_fetched.load(Ordering::Acquire),
            unknown_requests: self.unknown_requests.load(Ordering::Acquire),
            errors: self.error_count(),
        }
    }
}

/// Point-in-time copy of [`BrokerMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub active_connections: usize,
    pub produce_requests: u64,
    pub fetch_requests: u64,
    pub bytes_appended: u64,
    pub records_fetched: u64,
    pub unknown_requests: u64,
    pub errors: u64,
}

impl MetricsSnapshot {
    pub fn error_rate(&self) -> f64 {
        let total = self.produce_requests + self.fetch_requests + self.unknown_requests;
        if total > 0 {
            self.errors as f64 / total as f64
        } else {
            0.0
        }
    }
}
