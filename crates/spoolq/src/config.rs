//! Queue configuration.

use std::path::PathBuf;
use std::time::Duration;

/// How long a producer blocks on a full queue before the item is dropped.
pub const DEFAULT_ENQUEUE_TIMEOUT: Duration = Duration::from_secs(2);

/// Default segment roll-over threshold for disk queues.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 1024 * 1024;

const DEFAULT_CAPACITY: usize = 1000;

/// Storage backend selected at queue construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    /// Bounded in-memory ring buffer.
    Array,
    /// Linked FIFO; logically unbounded, but the configured capacity still
    /// applies for backpressure.
    Linked,
    /// Segmented on-disk spool; items survive the process.
    Disk,
    /// No queueing: the consumer runs inline on the producer's thread.
    Direct,
}

/// Configuration for a [`Queue`](crate::Queue).
///
/// Kind, capacity, and worker count are fixed once the queue is built.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Backend kind.
    pub kind: QueueKind,
    /// Maximum resident items before producers block (then time out).
    pub capacity: usize,
    /// Worker threads pulling from the queue. Disk queues always run
    /// exactly one so records reach the consumer in spool order.
    pub worker_count: usize,
    /// Producer block deadline before an item is dropped.
    pub enqueue_timeout: Duration,
    /// Directory holding spool segments (disk queues only).
    pub spool_dir: Option<PathBuf>,
    /// Segment roll-over threshold in bytes (disk queues only).
    pub max_file_bytes: u64,
}

impl QueueConfig {
    fn with_kind(kind: QueueKind) -> Self {
        Self {
            kind,
            capacity: DEFAULT_CAPACITY,
            worker_count: 1,
            enqueue_timeout: DEFAULT_ENQUEUE_TIMEOUT,
            spool_dir: None,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }

    /// Configuration for a bounded in-memory ring queue.
    pub fn array() -> Self {
        Self::with_kind(QueueKind::Array)
    }

    /// Configuration for a linked-FIFO queue.
    pub fn linked() -> Self {
        Self::with_kind(QueueKind::Linked)
    }

    /// Configuration for a disk-spool queue rooted at `spool_dir`.
    pub fn disk(spool_dir: impl Into<PathBuf>) -> Self {
        let mut config = Self::with_kind(QueueKind::Disk);
        config.spool_dir = Some(spool_dir.into());
        config
    }

    /// Configuration for direct (storage-free) dispatch.
    pub fn direct() -> Self {
        Self::with_kind(QueueKind::Direct)
    }

    /// Sets the capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        assert!(capacity >= 1, "queue capacity must be at least 1");
        self.capacity = capacity;
        self
    }

    /// Sets the number of worker threads.
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Sets the producer block deadline.
    pub fn with_enqueue_timeout(mut self, timeout: Duration) -> Self {
        self.enqueue_timeout = timeout;
        self
    }

    /// Sets the segment roll-over threshold.
    ///
    /// # Panics
    ///
    /// Panics if `max_file_bytes` is zero.
    pub fn with_max_file_bytes(mut self, max_file_bytes: u64) -> Self {
        assert!(max_file_bytes >= 1, "segment size must be at least 1 byte");
        self.max_file_bytes = max_file_bytes;
        self
    }
}
