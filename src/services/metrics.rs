//! Metrics collection for monitoring the check loop

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Collected counters since process start
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub cycles_completed: u64,
    /// Triggers rejected because a cycle was already running
    pub cycles_skipped: u64,
    pub listings_notified: u64,
    pub deliveries_failed: u64,
    pub fetch_errors: u64,
    pub storage_errors: u64,
    pub commands_handled: u64,
}

/// Thread-safe metrics collector
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    cycles_completed: AtomicU64,
    cycles_skipped: AtomicU64,
    listings_notified: AtomicU64,
    deliveries_failed: AtomicU64,
    fetch_errors: AtomicU64,
    storage_errors: AtomicU64,
    commands_handled: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_cycles_completed(&self) {
        self.inner.cycles_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cycles_skipped(&self) {
        self.inner.cycles_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_listings_notified(&self) {
        self.inner.listings_notified.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_deliveries_failed(&self) {
        self.inner.deliveries_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_fetch_errors(&self) {
        self.inner.fetch_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_storage_errors(&self) {
        self.inner.storage_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_commands_handled(&self) {
        self.inner.commands_handled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cycles_completed: self.inner.cycles_completed.load(Ordering::Relaxed),
            cycles_skipped: self.inner.cycles_skipped.load(Ordering::Relaxed),
            listings_notified: self.inner.listings_notified.load(Ordering::Relaxed),
            deliveries_failed: self.inner.deliveries_failed.load(Ordering::Relaxed),
            fetch_errors: self.inner.fetch_errors.load(Ordering::Relaxed),
            storage_errors: self.inner.storage_errors.load(Ordering::Relaxed),
            commands_handled: self.inner.commands_handled.load(Ordering::Relaxed),
        }
    }
}
