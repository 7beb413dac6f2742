//! Internal diagnostics and counters for a fanlog pipeline.
//!
//! Counters are held per pipeline instance and shared via `Arc`; there is no
//! process-global registry. Everything the error-handling policy swallows on
//! the delivery paths is visible here instead.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters tracking pipeline health.
#[derive(Debug, Default)]
pub struct Diagnostics {
    /// Records that passed the severity filter and entered `emit`
    records_emitted: AtomicU64,

    /// Records accepted into the live buffer
    records_enqueued: AtomicU64,

    /// Records dropped by the backpressure policy (all three variants)
    records_dropped_backpressure: AtomicU64,

    /// Records rejected because intake was already closed for shutdown
    records_rejected_shutdown: AtomicU64,

    /// Records confirmed delivered by the transport
    records_exported: AtomicU64,

    /// Records abandoned after the retry budget was exhausted
    records_lost_retry: AtomicU64,

    /// Records dropped on a fatal (non-retryable) transport failure
    records_lost_fatal: AtomicU64,

    /// Batches confirmed delivered by the transport
    batches_exported: AtomicU64,

    /// Errors swallowed on the synchronous sink path
    sink_errors: AtomicU64,
}

/// Point-in-time copy of the counters, for external queries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiagnosticsSnapshot {
    pub records_emitted: u64,
    pub records_enqueued: u64,
    pub records_dropped_backpressure: u64,
    pub records_rejected_shutdown: u64,
    pub records_exported: u64,
    pub records_lost_retry: u64,
    pub records_lost_fatal: u64,
    pub batches_exported: u64,
    pub sink_errors: u64,
}

impl DiagnosticsSnapshot {
    /// Records accepted into the buffer but never delivered.
    pub fn records_undelivered(&self) -> u64 {
        self.records_enqueued.saturating_sub(self.records_exported)
    }
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_records_emitted(&self) {
        self.records_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_records_enqueued(&self) {
        self.records_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_records_dropped_backpressure(&self) {
        self.records_dropped_backpressure
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_records_rejected_shutdown(&self) {
        self.records_rejected_shutdown
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_records_exported(&self, count: u64) {
        self.records_exported.fetch_add(count, Ordering::Relaxed);
        self.batches_exported.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_records_lost_retry(&self, count: u64) {
        self.records_lost_retry.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_records_lost_fatal(&self, count: u64) {
        self.records_lost_fatal.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_sink_errors(&self) {
        self.sink_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Records accepted into the buffer but not (yet) delivered.
    pub fn records_undelivered(&self) -> u64 {
        self.records_enqueued
            .load(Ordering::Relaxed)
            .saturating_sub(self.records_exported.load(Ordering::Relaxed))
    }

    pub fn records_exported(&self) -> u64 {
        self.records_exported.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            records_emitted: self.records_emitted.load(Ordering::Relaxed),
            records_enqueued: self.records_enqueued.load(Ordering::Relaxed),
            records_dropped_backpressure: self
                .records_dropped_backpressure
                .load(Ordering::Relaxed),
            records_rejected_shutdown: self.records_rejected_shutdown.load(Ordering::Relaxed),
            records_exported: self.records_exported.load(Ordering::Relaxed),
            records_lost_retry: self.records_lost_retry.load(Ordering::Relaxed),
            records_lost_fatal: self.records_lost_fatal.load(Ordering::Relaxed),
            batches_exported: self.batches_exported.load(Ordering::Relaxed),
            sink_errors: self.sink_errors.load(Ordering::Relaxed),
        }
    }
}
