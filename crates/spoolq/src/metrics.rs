//! Queue counters for monitoring and tests.

use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters updated by producers and workers.
#[derive(Debug, Default)]
pub(crate) struct Metrics {
    enqueued: AtomicU64,
    dequeued: AtomicU64,
    dropped: AtomicU64,
    consumer_errors: AtomicU64,
    dequeue_errors: AtomicU64,
}

impl Metrics {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dequeued(&self) {
        self.dequeued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_consumer_error(&self) {
        self.consumer_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dequeue_error(&self) {
        self.dequeue_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dequeued: self.dequeued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            consumer_errors: self.consumer_errors.load(Ordering::Relaxed),
            dequeue_errors: self.dequeue_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the queue's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Items accepted by `enqueue` (direct dispatches included).
    pub enqueued: u64,
    /// Items handed to the consumer by workers or direct dispatch.
    pub dequeued: u64,
    /// Items dropped because the enqueue timeout expired or the queue was
    /// closing.
    pub dropped: u64,
    /// Consumer invocations that returned an error.
    pub consumer_errors: u64,
    /// Dequeue attempts that lost an item to a backend failure.
    pub dequeue_errors: u64,
}
