//! Pluggable storage backends for the queue.
//!
//! The backend set is closed, so dispatch is a tagged enum rather than a
//! trait object: every queue owns exactly one [`Backend`] and the worker and
//! enqueue paths match on it under the queue mutex.

use crate::error::{DequeueError, SpoolError};
use crate::record::Record;
use crate::spool::DiskStore;
use std::ptr;

/// Storage strategy selected at queue construction.
pub(crate) enum Backend<T> {
    /// Bounded ring of slots.
    Array(ArrayStore<T>),
    /// Unbounded singly-linked FIFO.
    Linked(LinkedStore<T>),
    /// Segmented on-disk spool.
    Disk(DiskStore<T>),
    /// No storage: the queue dispatches to the consumer inline.
    Direct,
}

impl<T: Record> Backend<T> {
    /// Stores one item. For [`Backend::Direct`] this is a no-op; the queue
    /// never routes items here because direct enqueue dispatches inline.
    pub(crate) fn add(&mut self, item: T) -> Result<(), SpoolError> {
        match self {
            Self::Array(store) => {
                store.add(item);
                Ok(())
            }
            Self::Linked(store) => {
                store.add(item);
                Ok(())
            }
            Self::Disk(store) => store.add(item),
            Self::Direct => Ok(()),
        }
    }

    /// Takes the oldest stored item. Callers must hold the queue mutex and
    /// have observed a positive size.
    pub(crate) fn remove(&mut self) -> Result<T, DequeueError> {
        match self {
            Self::Array(store) => store.remove().ok_or(DequeueError::Empty),
            Self::Linked(store) => store.remove().ok_or(DequeueError::Empty),
            Self::Disk(store) => store.remove().map_err(DequeueError::from),
            Self::Direct => Err(DequeueError::Empty),
        }
    }
}

// ---------------------------------------------------------------------
// ARRAY: fixed-capacity ring
// ---------------------------------------------------------------------

/// Fixed-capacity ring of item slots.
///
/// Head and tail advance modulo capacity; full/empty discrimination is the
/// queue-level size counter, so the indices alone are never compared.
pub(crate) struct ArrayStore<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    tail: usize,
}

impl<T> ArrayStore<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots: slots.into_boxed_slice(),
            head: 0,
            tail: 0,
        }
    }

    fn add(&mut self, item: T) {
        debug_assert!(self.slots[self.tail].is_none(), "overwriting a live slot");
        self.slots[self.tail] = Some(item);
        self.tail = (self.tail + 1) % self.slots.len();
    }

    fn remove(&mut self) -> Option<T> {
        let item = self.slots[self.head].take();
        if item.is_some() {
            self.head = (self.head + 1) % self.slots.len();
        }
        item
    }
}

// ---------------------------------------------------------------------
// LINKED: unbounded singly-linked FIFO
// ---------------------------------------------------------------------

struct Node<T> {
    item: T,
    next: Option<Box<Node<T>>>,
}

/// Singly-linked FIFO of heap nodes.
///
/// `root` owns the chain; `last` is a raw cursor to the final node so
/// appends are O(1). `last` dangles exactly when `root` is `None`.
pub(crate) struct LinkedStore<T> {
    root: Option<Box<Node<T>>>,
    last: *mut Node<T>,
}

// SAFETY: `last` always aliases a node owned by `root` (or is null), and the
// store is only touched under the queue mutex, so sending it between threads
// cannot create concurrent access to the aliased node.
unsafe impl<T: Send> Send for LinkedStore<T> {}

impl<T> LinkedStore<T> {
    pub(crate) fn new() -> Self {
        Self {
            root: None,
            last: ptr::null_mut(),
        }
    }

    fn add(&mut self, item: T) {
        let mut node = Box::new(Node { item, next: None });
        let tail: *mut Node<T> = &mut *node;
        if self.root.is_none() {
            self.root = Some(node);
        } else {
            // SAFETY: `last` points at the final node of the chain owned by
            // `root`; no other reference to it exists while the queue mutex
            // is held.
            unsafe {
                (*self.last).next = Some(node);
            }
        }
        self.last = tail;
    }

    fn remove(&mut self) -> Option<T> {
        let mut node = self.root.take()?;
        self.root = node.next.take();
        if self.root.is_none() {
            self.last = ptr::null_mut();
        }
        Some(node.item)
    }
}

impl<T> Drop for LinkedStore<T> {
    fn drop(&mut self) {
        // Pop iteratively so a long resident chain cannot overflow the
        // stack through recursive Box drops.
        while self.remove().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn array_preserves_fifo_across_wrap() {
        let mut store = ArrayStore::new(3);
        store.add(1);
        store.add(2);
        assert_eq!(store.remove(), Some(1));
        store.add(3);
        store.add(4); // wraps to slot 0
        assert_eq!(store.remove(), Some(2));
        assert_eq!(store.remove(), Some(3));
        assert_eq!(store.remove(), Some(4));
        assert_eq!(store.remove(), None);
    }

    #[test]
    fn linked_preserves_fifo() {
        let mut store = LinkedStore::new();
        assert_eq!(store.remove(), None);
        for i in 0..100 {
            store.add(i);
        }
        for i in 0..100 {
            assert_eq!(store.remove(), Some(i));
        }
        assert_eq!(store.remove(), None);
        // Reusable after draining to empty.
        store.add(7);
        assert_eq!(store.remove(), Some(7));
    }

    #[test]
    fn linked_drop_releases_resident_items() {
        static DROPS: AtomicUsize = AtomicUsize::new(0);

        struct Probe;
        impl Drop for Probe {
            fn drop(&mut self) {
                DROPS.fetch_add(1, Ordering::SeqCst);
            }
        }

        DROPS.store(0, Ordering::SeqCst);
        {
            let mut store = LinkedStore::new();
            for _ in 0..1000 {
                store.add(Probe);
            }
        }
        assert_eq!(DROPS.load(Ordering::SeqCst), 1000);
    }

    #[test]
    fn array_drop_releases_resident_items() {
        static DROPS: AtomicUsize = AtomicUsize::new(0);

        struct Probe;
        impl Drop for Probe {
            fn drop(&mut self) {
                DROPS.fetch_add(1, Ordering::SeqCst);
            }
        }

        DROPS.store(0, Ordering::SeqCst);
        {
            let mut store = ArrayStore::new(8);
            for _ in 0..5 {
                store.add(Probe);
            }
            drop(store.remove());
        }
        assert_eq!(DROPS.load(Ordering::SeqCst), 5);
    }
}
