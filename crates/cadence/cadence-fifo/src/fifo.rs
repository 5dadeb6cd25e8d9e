//! The FIFO object: geometry bound to a caller-owned frame buffer and two indices.
//!
//! A `Fifo` never allocates or frees the frame memory; it borrows it for its
//! lifetime. Indices are either embedded (single-process) or borrowed from
//! shared memory (multi-process). Writers and readers attach to a `Fifo` by
//! reference and reach its internals through the crate-private accessors below.
//!
//! # Trust model
//! Both sides of a shared FIFO are assumed to be cooperating, same-architecture
//! processes. Index values read from the peer are range-checked, so accidental
//! corruption is reported as [`FifoError::CorruptedIndices`], but a malicious
//! peer is not defended against.

use crate::error::FifoError;
use crate::geometry::Geometry;
use crate::index::FifoIndex;
use crate::provider::Fragment;
use crate::wait::SyncMode;
use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Largest buffer, in bytes, a FIFO may span.
pub const MAX_CAPACITY_BYTES: u64 = i32::MAX as u64;

#[derive(Debug)]
enum IndexSlot<'a> {
    Owned(FifoIndex),
    Borrowed(&'a FifoIndex),
}

impl IndexSlot<'_> {
    #[inline(always)]
    fn get(&self) -> &FifoIndex {
        match self {
            IndexSlot::Owned(index) => index,
            IndexSlot::Borrowed(index) => index,
        }
    }
}

/// Validates FIFO dimensions and returns the buffer size in bytes.
pub(crate) fn capacity_bytes(frame_count: u32, frame_size: u32) -> Result<usize, FifoError> {
    Geometry::new(frame_count).map_err(|err| match err {
        FifoError::CapacityTooLarge { .. } => FifoError::CapacityTooLarge {
            frame_count,
            frame_size,
        },
        other => other,
    })?;
    if frame_size == 0 {
        return Err(FifoError::ZeroFrameSize);
    }
    let bytes = frame_count as u64 * frame_size as u64;
    if bytes > MAX_CAPACITY_BYTES {
        return Err(FifoError::CapacityTooLarge {
            frame_count,
            frame_size,
        });
    }
    Ok(bytes as usize)
}

pub struct Fifo<'a> {
    geometry: Geometry,
    frame_size: u32,
    buffer: NonNull<u8>,
    rear: IndexSlot<'a>,
    throttle_front: Option<IndexSlot<'a>>,
    rear_sync: SyncMode,
    front_sync: SyncMode,
    writer_attached: AtomicBool,
    throttler_attached: AtomicBool,
    _buffer: PhantomData<&'a UnsafeCell<[u8]>>,
}

// SAFETY: the buffer is only touched through the obtain/release protocol, which
// gives the single writer exclusive access to the span it obtained and readers
// shared access to published spans.
unsafe impl Send for Fifo<'_> {}
unsafe impl Sync for Fifo<'_> {}

impl<'a> Fifo<'a> {
    /// Single-process FIFO owning its rear index and, if `throttles_writer`,
    /// the front index of one throttling reader.
    ///
    /// `buffer` must hold at least `frame_count * frame_size` bytes.
    pub fn new(
        frame_count: u32,
        frame_size: u32,
        buffer: &'a mut [u8],
        throttles_writer: bool,
    ) -> Result<Self, FifoError> {
        let front = throttles_writer.then(|| IndexSlot::Owned(FifoIndex::new(0)));
        Self::build(
            frame_count,
            frame_size,
            buffer,
            IndexSlot::Owned(FifoIndex::new(0)),
            front,
            SyncMode::FutexPrivate,
        )
    }

    /// Multi-process FIFO over indices that live in shared memory.
    ///
    /// Exactly one process must have initialized `shared_rear` (and
    /// `throttle_front`, if any) before either side obtains or releases.
    /// This is not, and cannot be, checked here.
    pub fn shared(
        frame_count: u32,
        frame_size: u32,
        buffer: &'a mut [u8],
        shared_rear: &'a FifoIndex,
        throttle_front: Option<&'a FifoIndex>,
    ) -> Result<Self, FifoError> {
        Self::build(
            frame_count,
            frame_size,
            buffer,
            IndexSlot::Borrowed(shared_rear),
            throttle_front.map(IndexSlot::Borrowed),
            SyncMode::FutexShared,
        )
    }

    fn build(
        frame_count: u32,
        frame_size: u32,
        buffer: &'a mut [u8],
        rear: IndexSlot<'a>,
        throttle_front: Option<IndexSlot<'a>>,
        sync: SyncMode,
    ) -> Result<Self, FifoError> {
        let needed = capacity_bytes(frame_count, frame_size)?;
        if buffer.len() < needed {
            return Err(FifoError::BufferTooSmall {
                needed,
                actual: buffer.len(),
            });
        }
        let geometry = Geometry::new(frame_count)?;
        debug!(
            frame_count,
            frame_size,
            fudge_factor = geometry.fudge_factor(),
            throttled = throttle_front.is_some(),
            "fifo constructed"
        );
        Ok(Self {
            geometry,
            frame_size,
            buffer: NonNull::from(buffer).cast(),
            rear,
            throttle_front,
            rear_sync: sync,
            front_sync: sync,
            writer_attached: AtomicBool::new(false),
            throttler_attached: AtomicBool::new(false),
            _buffer: PhantomData,
        })
    }

    /// Overrides how waiters block on the rear index (readers) and on the
    /// throttling front index (the writer).
    pub fn with_sync(mut self, rear_sync: SyncMode, front_sync: SyncMode) -> Self {
        self.rear_sync = rear_sync;
        self.front_sync = front_sync;
        self
    }

    #[inline(always)]
    pub fn frame_count(&self) -> u32 {
        self.geometry.frame_count()
    }

    #[inline(always)]
    pub fn frame_size(&self) -> u32 {
        self.frame_size
    }

    #[inline(always)]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn capacity_bytes(&self) -> usize {
        self.frame_count() as usize * self.frame_size as usize
    }

    /// Whether a throttling reader bounds the writer.
    pub fn is_throttled(&self) -> bool {
        self.throttle_front.is_some()
    }

    pub fn rear_sync(&self) -> SyncMode {
        self.rear_sync
    }

    pub fn front_sync(&self) -> SyncMode {
        self.front_sync
    }

    #[inline(always)]
    pub(crate) fn rear(&self) -> &FifoIndex {
        self.rear.get()
    }

    #[inline(always)]
    pub(crate) fn throttle_front(&self) -> Option<&FifoIndex> {
        self.throttle_front.as_ref().map(IndexSlot::get)
    }

    /// Start of `fragment` in the frame buffer and its length in bytes.
    ///
    /// Panics if the fragment does not lie inside the buffer.
    #[inline]
    pub(crate) fn fragment_ptr(&self, fragment: Fragment) -> (*mut u8, usize) {
        assert!(
            fragment.length == 0
                || fragment.offset as u64 + fragment.length as u64 <= self.frame_count() as u64,
            "fragment {fragment:?} outside fifo of {} frames",
            self.frame_count()
        );
        if fragment.length == 0 {
            return (self.buffer.as_ptr(), 0);
        }
        let frame_size = self.frame_size as usize;
        // SAFETY: offset + length <= frame_count, and the buffer holds frame_count frames.
        let ptr = unsafe { self.buffer.as_ptr().add(fragment.offset as usize * frame_size) };
        (ptr, fragment.length as usize * frame_size)
    }

    pub(crate) fn attach_writer(&self) -> Result<(), FifoError> {
        if self.writer_attached.swap(true, Ordering::AcqRel) {
            return Err(FifoError::WriterExists);
        }
        Ok(())
    }

    pub(crate) fn detach_writer(&self) {
        self.writer_attached.store(false, Ordering::Release);
    }

    pub(crate) fn attach_throttler(&self) -> Result<&FifoIndex, FifoError> {
        let front = self.throttle_front().ok_or(FifoError::NoThrottleIndex)?;
        if self.throttler_attached.swap(true, Ordering::AcqRel) {
            return Err(FifoError::ThrottlingReaderExists);
        }
        Ok(front)
    }

    pub(crate) fn detach_throttler(&self) {
        self.throttler_attached.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructs_for_valid_dimensions() {
        for (frame_count, frame_size) in [(1u32, 1u32), (6, 4), (8, 4), (1000, 3)] {
            let mut buf = vec![0u8; (frame_count * frame_size) as usize];
            let fifo = Fifo::new(frame_count, frame_size, &mut buf, false).unwrap();
            assert_eq!(fifo.frame_count(), frame_count);
            assert_eq!(fifo.frame_size(), frame_size);
            assert_eq!(fifo.capacity_bytes(), (frame_count * frame_size) as usize);
            assert!(!fifo.is_throttled());
        }
    }

    #[test]
    fn rejects_invalid_dimensions() {
        let mut buf = vec![0u8; 64];
        assert_eq!(
            Fifo::new(0, 4, &mut buf, false).err(),
            Some(FifoError::ZeroFrameCount)
        );
        assert_eq!(
            Fifo::new(8, 0, &mut buf, false).err(),
            Some(FifoError::ZeroFrameSize)
        );
        assert_eq!(
            Fifo::new(1 << 20, 1 << 12, &mut buf, false).err(),
            Some(FifoError::CapacityTooLarge {
                frame_count: 1 << 20,
                frame_size: 1 << 12
            })
        );
        assert_eq!(
            Fifo::new(32, 4, &mut buf, false).err(),
            Some(FifoError::BufferTooSmall {
                needed: 128,
                actual: 64
            })
        );
    }

    #[test]
    fn shared_mode_borrows_indices() {
        let rear = FifoIndex::new(0);
        let front = FifoIndex::new(0);
        let mut buf = vec![0u8; 32];
        let fifo = Fifo::shared(8, 4, &mut buf, &rear, Some(&front)).unwrap();
        assert!(fifo.is_throttled());
        assert_eq!(fifo.rear_sync(), SyncMode::FutexShared);
        fifo.rear().store_release(3);
        assert_eq!(rear.load_acquire(), 3);
        assert!(std::ptr::eq(fifo.throttle_front().unwrap(), &front));
    }

    #[test]
    fn fragment_ptr_is_bounds_checked() {
        let mut buf = vec![0u8; 24];
        let fifo = Fifo::new(6, 4, &mut buf, false).unwrap();
        let (_, len) = fifo.fragment_ptr(Fragment {
            offset: 4,
            length: 2,
        });
        assert_eq!(len, 8);
    }

    #[test]
    #[should_panic(expected = "outside fifo")]
    fn fragment_past_end_panics() {
        let mut buf = vec![0u8; 24];
        let fifo = Fifo::new(6, 4, &mut buf, false).unwrap();
        fifo.fragment_ptr(Fragment {
            offset: 5,
            length: 2,
        });
    }

    #[test]
    fn one_writer_and_one_throttler() {
        let mut buf = vec![0u8; 32];
        let fifo = Fifo::new(8, 4, &mut buf, true).unwrap();
        fifo.attach_writer().unwrap();
        assert_eq!(fifo.attach_writer(), Err(FifoError::WriterExists));
        fifo.detach_writer();
        fifo.attach_writer().unwrap();

        fifo.attach_throttler().unwrap();
        assert_eq!(
            fifo.attach_throttler().err(),
            Some(FifoError::ThrottlingReaderExists)
        );

        let mut buf = vec![0u8; 32];
        let unthrottled = Fifo::new(8, 4, &mut buf, false).unwrap();
        assert_eq!(
            unthrottled.attach_throttler().err(),
            Some(FifoError::NoThrottleIndex)
        );
    }
}
