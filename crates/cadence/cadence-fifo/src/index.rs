//! The 32-bit frame counter shared between a writer and one throttling reader.
//!
//! A `FifoIndex` counts frames ever enqueued (rear) or dequeued (front) and wraps
//! modulo 2^32; only differences between two indices carry meaning.
//!
//! The type is plain old data: `#[repr(transparent)]` over an `AtomicU32`, so it
//! has the same size and bit pattern as a `u32` and can be placed in a shared
//! mapping. When shared, exactly one process must initialize it (write a fresh
//! `FifoIndex::new(0)` in place) before either side touches the FIFO. This
//! cannot be checked across processes and is a precondition of every shared
//! constructor in this crate.
//!
//! Access modes are explicit. There is no default ordering: callers pick
//! `load_acquire`/`store_release` for publish/subscribe and the relaxed forms
//! only where no data hand-off depends on the value.

use std::sync::atomic::{AtomicU32, Ordering};

#[repr(transparent)]
#[derive(Debug, Default)]
pub struct FifoIndex {
    index: AtomicU32,
}

const _: () = assert!(std::mem::size_of::<FifoIndex>() == 4);
const _: () = assert!(std::mem::align_of::<FifoIndex>() == 4);

impl FifoIndex {
    pub const fn new(value: u32) -> Self {
        Self {
            index: AtomicU32::new(value),
        }
    }

    #[inline(always)]
    pub fn load_relaxed(&self) -> u32 {
        self.index.load(Ordering::Relaxed)
    }

    /// Pairs with `store_release` on the other side: every frame written
    /// before the matching store is visible after this load.
    #[inline(always)]
    pub fn load_acquire(&self) -> u32 {
        self.index.load(Ordering::Acquire)
    }

    #[inline(always)]
    pub fn store_relaxed(&self, value: u32) {
        self.index.store(value, Ordering::Relaxed)
    }

    /// Publishes `value` after all prior buffer accesses of this thread.
    #[inline(always)]
    pub fn store_release(&self, value: u32) {
        self.index.store(value, Ordering::Release)
    }

    /// The futex word backing this index.
    #[inline(always)]
    pub(crate) fn word(&self) -> &AtomicU32 {
        &self.index
    }
}
