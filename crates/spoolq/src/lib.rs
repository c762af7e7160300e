//! spoolq - In-Process Message Queue with Pluggable Backends
//!
//! A syslog-daemon style queue: producers enqueue opaque items, a pool of
//! worker threads hands them to a consumer callback. One abstraction covers
//! four storage strategies chosen at construction.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                            Queue<T>                                 │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │                                                                     │
//! │  Producer ──enqueue──► [ Backend ] ──dequeue──► Worker ──► Consumer │
//! │                           │                                         │
//! │          ┌────────────────┼──────────────┬──────────────┐           │
//! │       ARRAY            LINKED          DISK           DIRECT        │
//! │   bounded ring      unbounded FIFO  segment spool   inline call     │
//! │                                                                     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! **Key behaviors:**
//! - Bounded blocking: a producer facing a full queue blocks up to the
//!   enqueue timeout (2 s by default), then the item is dropped. This lossy
//!   policy keeps producers from hanging forever.
//! - Graceful drain: closing the queue stops new enqueues, but workers keep
//!   delivering until the queue is empty before they exit.
//! - Disk durability: the [`QueueKind::Disk`] backend spools serialized
//!   records into bounded segment files; a queue reopened over the same
//!   directory resumes with the surviving records.
//! - Direct dispatch: [`QueueKind::Direct`] skips storage entirely and runs
//!   the consumer on the producer's thread.
//!
//! # Example
//!
//! ```
//! use spoolq::{ByteSource, Queue, QueueConfig, Record, SpoolError};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! struct Tick(u64);
//!
//! impl Record for Tick {
//!     fn encode(&self, sink: &mut Vec<u8>) {
//!         sink.extend_from_slice(self.0.to_string().as_bytes());
//!         sink.push(b'\n');
//!     }
//!     fn decode(source: &mut dyn ByteSource) -> Result<Self, SpoolError> {
//!         let value = spoolq::read_decimal(source)?;
//!         spoolq::expect_byte(source, b'\n')?;
//!         Ok(Tick(value))
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let total = Arc::new(AtomicU64::new(0));
//! let sink = Arc::clone(&total);
//! let mut queue = Queue::new(
//!     QueueConfig::array().with_capacity(16),
//!     move |tick: Tick| -> Result<(), spoolq::BoxError> {
//!         sink.fetch_add(tick.0, Ordering::SeqCst);
//!         Ok(())
//!     },
//! )?;
//! queue.start()?;
//! for i in 1..=4 {
//!     queue.enqueue(Tick(i))?;
//! }
//! drop(queue); // closes, drains, joins the workers
//! assert_eq!(total.load(Ordering::SeqCst), 10);
//! # Ok(())
//! # }
//! ```

mod backend;
mod config;
mod error;
mod metrics;
mod queue;
mod record;
mod spool;
mod worker;

pub use config::{QueueConfig, QueueKind, DEFAULT_ENQUEUE_TIMEOUT, DEFAULT_MAX_FILE_BYTES};
pub use error::{BoxError, DequeueError, EnqueueError, SpoolError};
pub use metrics::MetricsSnapshot;
pub use queue::{Consumer, Queue};
pub use record::{expect_byte, read_decimal, ByteSource, Record, SliceSource};
