//! Worker threads: pull items off the queue and feed the consumer.

use crate::queue::Shared;
use crate::record::Record;
use std::sync::Arc;
use tracing::{debug, warn};

/// Body of one worker thread.
///
/// The loop holds the queue mutex only across the dequeue itself; the
/// consumer always runs unlocked so it may block on I/O without stalling
/// producers. Errors from the consumer or the backend are logged and
/// absorbed. Shutdown is cooperative: a worker exits once the running flag
/// is cleared *and* the queue is empty, so items resident at close time are
/// still delivered.
pub(crate) fn run<T: Record>(shared: Arc<Shared<T>>, id: usize) {
    mask_signals();
    debug!(worker = id, "worker started");
    loop {
        let mut state = shared.state.lock();
        while state.size == 0 && state.running {
            shared.not_empty.wait(&mut state);
        }
        if state.size > 0 {
            let removed = state.backend.remove();
            // Decremented even when the backend failed: one lost item is
            // better than a size counter that can never reach empty again.
            state.size -= 1;
            drop(state);
            shared.not_full.notify_one();
            match removed {
                Ok(item) => {
                    shared.metrics.record_dequeued();
                    if let Err(err) = shared.consumer.consume(item) {
                        shared.metrics.record_consumer_error();
                        warn!(worker = id, error = %err, "consumer failed, continuing");
                    }
                }
                Err(err) => {
                    shared.metrics.record_dequeue_error();
                    warn!(worker = id, error = %err, "dequeue failed, item lost");
                }
            }
        } else {
            let drained = !state.running;
            drop(state);
            if drained {
                break;
            }
        }
    }
    debug!(worker = id, "worker exiting");
}

/// Blocks every signal on this thread. Signal delivery belongs to the
/// process's dedicated signal-handling thread; an unmasked worker would
/// have its blocking system calls interrupted at random.
#[cfg(unix)]
fn mask_signals() {
    // SAFETY: sigfillset and pthread_sigmask operate on a stack-local
    // signal set and only affect the calling thread's mask.
    unsafe {
        let mut set = std::mem::MaybeUninit::<libc::sigset_t>::uninit();
        if libc::sigfillset(set.as_mut_ptr()) == 0 {
            libc::pthread_sigmask(libc::SIG_BLOCK, set.as_ptr(), std::ptr::null_mut());
        }
    }
}

#[cfg(not(unix))]
fn mask_signals() {}
