//! Queue core: synchronization discipline, lifecycle, and the enqueue path.
//!
//! One mutex guards the backend, the size counter, and the running flag.
//! Two condition variables pair with it: `not_full` wakes producers after a
//! dequeue, `not_empty` wakes workers after an enqueue (and is broadcast at
//! shutdown). Consumers always run with the mutex released.

use crate::backend::{ArrayStore, Backend, LinkedStore};
use crate::config::{QueueConfig, QueueKind};
use crate::error::{BoxError, EnqueueError, SpoolError};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::record::Record;
use crate::spool::DiskStore;
use crate::worker;
use parking_lot::{Condvar, Mutex};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, warn};

/// Per-item callback invoked by workers (or inline, for direct queues).
///
/// Must be thread-safe when the queue runs more than one worker. A non-OK
/// result is logged and absorbed; it never stops the queue.
pub trait Consumer<T>: Send + Sync {
    /// Processes one dequeued item.
    fn consume(&self, item: T) -> Result<(), BoxError>;
}

impl<T, F> Consumer<T> for F
where
    F: Fn(T) -> Result<(), BoxError> + Send + Sync,
{
    fn consume(&self, item: T) -> Result<(), BoxError> {
        self(item)
    }
}

/// Mutable queue state, guarded by the queue mutex.
pub(crate) struct QueueState<T> {
    pub(crate) backend: Backend<T>,
    pub(crate) size: usize,
    pub(crate) running: bool,
}

/// State shared between the queue handle and its workers.
pub(crate) struct Shared<T> {
    pub(crate) state: Mutex<QueueState<T>>,
    pub(crate) not_full: Condvar,
    pub(crate) not_empty: Condvar,
    pub(crate) consumer: Box<dyn Consumer<T>>,
    pub(crate) metrics: Metrics,
    capacity: usize,
    enqueue_timeout: Duration,
    kind: QueueKind,
    /// Lock-free mirror of the running flag for the direct dispatch path,
    /// which by contract takes no locks.
    closed: AtomicBool,
}

impl<T: Record> Shared<T> {
    /// Direct dispatch: the consumer runs synchronously on the calling
    /// thread and the queue size stays at zero throughout.
    fn dispatch_direct(&self, item: T) -> Result<(), EnqueueError> {
        if self.closed.load(Ordering::Acquire) {
            self.metrics.record_dropped();
            return Err(EnqueueError::Closed);
        }
        self.metrics.record_enqueued();
        match self.consumer.consume(item) {
            Ok(()) => {
                self.metrics.record_dequeued();
                Ok(())
            }
            Err(err) => {
                self.metrics.record_consumer_error();
                Err(EnqueueError::Consumer(err))
            }
        }
    }
}

/// A message queue with a pluggable storage backend and a worker pool.
///
/// Construction picks the backend; [`start`](Self::start) spawns the
/// workers; dropping the queue closes it, drains resident items through the
/// workers, and joins them.
pub struct Queue<T: Record> {
    shared: Arc<Shared<T>>,
    workers: Vec<JoinHandle<()>>,
    worker_count: usize,
    started: bool,
}

impl<T: Record> Queue<T> {
    /// Builds a queue from `config` with the given consumer.
    ///
    /// For disk queues this scans the spool directory: records surviving
    /// from a previous run become the queue's initial content. Disk queues
    /// always run exactly one worker; any other request is overridden with
    /// a warning so records reach the consumer in spool order.
    ///
    /// # Panics
    ///
    /// Panics if `config.capacity` is zero, or if `config.kind` is
    /// [`QueueKind::Disk`] and no spool directory is set.
    pub fn new(
        config: QueueConfig,
        consumer: impl Consumer<T> + 'static,
    ) -> Result<Self, SpoolError> {
        assert!(config.capacity >= 1, "queue capacity must be at least 1");

        let mut worker_count = config.worker_count;
        let mut initial_size = 0;
        let backend = match config.kind {
            QueueKind::Array => Backend::Array(ArrayStore::new(config.capacity)),
            QueueKind::Linked => Backend::Linked(LinkedStore::new()),
            QueueKind::Direct => {
                worker_count = 0;
                Backend::Direct
            }
            QueueKind::Disk => {
                if worker_count != 1 {
                    warn!(
                        requested = worker_count,
                        "disk queues run exactly one worker to preserve record order"
                    );
                    worker_count = 1;
                }
                let dir = config
                    .spool_dir
                    .as_deref()
                    .expect("disk queue requires a spool directory");
                let (store, resident) = DiskStore::open(dir, config.max_file_bytes)?;
                if resident > 0 {
                    debug!(resident, "queue resumes with spooled records");
                }
                initial_size = resident;
                Backend::Disk(store)
            }
        };

        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState {
                backend,
                size: initial_size,
                running: true,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            consumer: Box::new(consumer),
            metrics: Metrics::new(),
            capacity: config.capacity,
            enqueue_timeout: config.enqueue_timeout,
            kind: config.kind,
            closed: AtomicBool::new(false),
        });

        Ok(Self {
            shared,
            workers: Vec::new(),
            worker_count,
            started: false,
        })
    }

    /// Spawns the worker threads. A second call is a no-op; direct queues
    /// spawn none.
    pub fn start(&mut self) -> io::Result<()> {
        if self.started {
            return Ok(());
        }
        self.started = true;
        self.workers.reserve(self.worker_count);
        for id in 0..self.worker_count {
            let shared = Arc::clone(&self.shared);
            let handle = std::thread::Builder::new()
                .name(format!("spoolq-worker-{id}"))
                .spawn(move || worker::run(shared, id))?;
            self.workers.push(handle);
        }
        Ok(())
    }

    /// Enqueues one item.
    ///
    /// Blocks while the queue is at capacity, up to the configured enqueue
    /// timeout; on timeout the item is dropped and
    /// [`EnqueueError::Full`] is returned. Once the queue is closing every
    /// enqueue returns [`EnqueueError::Closed`].
    ///
    /// For direct queues this invokes the consumer on the calling thread
    /// before returning, with no locking and no storage.
    pub fn enqueue(&self, item: T) -> Result<(), EnqueueError> {
        let shared = &*self.shared;
        if shared.kind == QueueKind::Direct {
            return shared.dispatch_direct(item);
        }

        let mut state = shared.state.lock();
        while state.size >= shared.capacity {
            if !state.running {
                shared.metrics.record_dropped();
                return Err(EnqueueError::Closed);
            }
            let timed_out = shared
                .not_full
                .wait_for(&mut state, shared.enqueue_timeout)
                .timed_out();
            if timed_out && state.size >= shared.capacity && state.running {
                drop(state);
                shared.metrics.record_dropped();
                debug!(timeout = ?shared.enqueue_timeout, "enqueue timed out, dropping item");
                return Err(EnqueueError::Full(shared.enqueue_timeout));
            }
        }
        if !state.running {
            shared.metrics.record_dropped();
            return Err(EnqueueError::Closed);
        }

        state.backend.add(item)?;
        state.size += 1;
        drop(state);
        shared.metrics.record_enqueued();
        shared.not_empty.notify_one();
        Ok(())
    }

    /// Initiates shutdown: no further enqueues are accepted, workers keep
    /// draining until the queue is empty. Idempotent. The workers are
    /// joined when the queue is dropped.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        {
            let mut state = self.shared.state.lock();
            if !state.running {
                return;
            }
            state.running = false;
        }
        debug!("queue closing, draining resident items");
        // Wake idle workers so they notice the shutdown, and blocked
        // producers so they observe the closed state.
        self.shared.not_empty.notify_all();
        self.shared.not_full.notify_all();
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Number of items currently resident.
    pub fn len(&self) -> usize {
        self.shared.state.lock().size
    }

    /// Returns `true` if no items are resident.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The configured capacity.
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// The backend kind this queue was built with.
    pub fn kind(&self) -> QueueKind {
        self.shared.kind
    }

    /// Number of worker threads this queue runs once started.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// A point-in-time copy of the queue counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }
}

impl<T: Record> Drop for Queue<T> {
    fn drop(&mut self) {
        self.close();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("worker thread panicked during shutdown");
            }
        }
        // A disk queue that drained completely leaves no segments behind,
        // so the next run does not replay consumed records. If items are
        // still resident (no workers ran), the files stay for recovery.
        let mut state = self.shared.state.lock();
        if state.size == 0 {
            if let Backend::Disk(store) = &mut state.backend {
                store.discard_drained();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SpoolError;
    use crate::record::ByteSource;
    use std::sync::atomic::AtomicU64;
    use tempfile::tempdir;

    struct Seq(u64);

    impl Record for Seq {
        fn encode(&self, sink: &mut Vec<u8>) {
            sink.extend_from_slice(self.0.to_string().as_bytes());
            sink.push(b'\n');
        }

        fn decode(source: &mut dyn ByteSource) -> Result<Self, SpoolError> {
            let value = crate::record::read_decimal(source)?;
            crate::record::expect_byte(source, b'\n')?;
            Ok(Seq(value))
        }
    }

    fn ignore_all() -> impl Consumer<Seq> {
        |_item: Seq| -> Result<(), BoxError> { Ok(()) }
    }

    #[test]
    fn disk_queue_forces_a_single_worker() {
        let dir = tempdir().unwrap();
        let config = QueueConfig::disk(dir.path()).with_worker_count(4);
        let queue = Queue::new(config, ignore_all()).unwrap();
        assert_eq!(queue.worker_count(), 1);
    }

    #[test]
    fn direct_queue_spawns_no_workers() {
        let config = QueueConfig::direct().with_worker_count(8);
        let queue = Queue::new(config, ignore_all()).unwrap();
        assert_eq!(queue.worker_count(), 0);
    }

    #[test]
    fn closed_queue_rejects_enqueue() {
        let queue = Queue::new(QueueConfig::array(), ignore_all()).unwrap();
        queue.close();
        assert!(matches!(
            queue.enqueue(Seq(1)),
            Err(EnqueueError::Closed)
        ));
        assert!(queue.is_closed());
        assert_eq!(queue.metrics().dropped, 1);
    }

    #[test]
    fn close_is_idempotent() {
        let queue = Queue::new(QueueConfig::linked(), ignore_all()).unwrap();
        queue.close();
        queue.close();
        assert!(queue.is_closed());
    }

    #[test]
    fn sum_drains_through_workers() {
        let total = Arc::new(AtomicU64::new(0));
        let sink = Arc::clone(&total);
        let mut queue = Queue::new(
            QueueConfig::array().with_capacity(4).with_worker_count(2),
            move |item: Seq| -> Result<(), BoxError> {
                sink.fetch_add(item.0, Ordering::SeqCst);
                Ok(())
            },
        )
        .unwrap();
        queue.start().unwrap();
        for i in 1..=100 {
            queue.enqueue(Seq(i)).unwrap();
        }
        drop(queue);
        assert_eq!(total.load(Ordering::SeqCst), 5050);
    }
}
