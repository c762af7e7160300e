//! Error types for queue and spool operations.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Boxed error type used for consumer results.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by the disk spool and by record decoding.
#[derive(Debug, Error)]
pub enum SpoolError {
    /// An I/O operation on a segment file failed.
    #[error("spool I/O failed: {0}")]
    Io(#[from] io::Error),

    /// End of the current segment was reached at a record boundary.
    ///
    /// This is an internal signal: the disk backend reacts by advancing to
    /// the next segment. It reaches callers only when there is no further
    /// segment to advance to.
    #[error("end of spool segment")]
    Eof,

    /// A record could not be reconstructed from its serialized form.
    #[error("malformed spool record: {0}")]
    Format(&'static str),

    /// The writer rolled onto a segment number whose file already exists.
    ///
    /// Segment numbers are a monotonic `u64`, but file names carry only the
    /// low six decimal digits. A collision therefore means roughly a million
    /// live segments, which is reported rather than silently overwritten.
    #[error("spool segment file {name} already exists (sequence collision)")]
    SegmentCollision {
        /// File name of the colliding segment.
        name: String,
    },
}

impl SpoolError {
    /// Returns `true` if this is the internal end-of-segment signal.
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Eof)
    }
}

/// Errors returned to producers by [`Queue::enqueue`](crate::Queue::enqueue).
#[derive(Debug, Error)]
pub enum EnqueueError {
    /// The queue stayed full for the whole enqueue timeout.
    ///
    /// The item has already been dropped by the queue; this policy trades
    /// one lost message for a producer that never blocks forever.
    #[error("queue full, item dropped after {0:?}")]
    Full(Duration),

    /// The queue is draining and no longer accepts items.
    #[error("queue is shutting down")]
    Closed,

    /// The consumer rejected the item (direct dispatch only).
    #[error("consumer rejected item: {0}")]
    Consumer(BoxError),

    /// Writing the item to the disk spool failed.
    #[error(transparent)]
    Spool(#[from] SpoolError),
}

impl EnqueueError {
    /// Returns `true` if the enqueue may succeed when retried later.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Full(_))
    }
}

/// Errors raised while taking an item off a backend.
///
/// Workers log these and keep running; the size counter is decremented
/// regardless, so a bad record costs one message rather than a stalled queue.
#[derive(Debug, Error)]
pub enum DequeueError {
    /// The backend held no item despite a positive queue size.
    #[error("backend empty despite positive queue size")]
    Empty,

    /// Reading or decoding from the disk spool failed.
    #[error(transparent)]
    Spool(#[from] SpoolError),
}
