//! The consumer side of a FIFO.
//!
//! Any number of readers may follow one writer. At most one of them throttles
//! the writer: its releases are published to the shared front index, and the
//! writer never overwrites frames it has not released. Every other reader is
//! an observer. An observer that falls more than a buffer behind gets
//! [`FifoError::Overflow`] from its next obtain, is snapped forward to the
//! newest `frame_count` frames, and carries on.

use crate::error::FifoError;
use crate::fifo::Fifo;
use crate::index::FifoIndex;
use crate::provider::{Fragment, Obtained, Provider, deadline, remaining};
use std::time::Duration;
use tracing::{debug, error};

/// Outcome of [`Reader::read`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOutcome {
    pub frames: usize,
    /// Frames skipped by an overflow detected before this read's data.
    pub lost: usize,
}

pub struct Reader<'a> {
    fifo: &'a Fifo<'a>,
    /// Index of the next frame to read. Private shadow of the shared front.
    local_front: u32,
    throttle_front: Option<&'a FifoIndex>,
    /// Unreleased part of the last obtain.
    obtained: Obtained,
    // Reader-side watermarks are accepted but not acted upon yet. They are
    // reserved for letting a reader wake a writer that produces too slowly.
    high_arm_threshold: u32,
    low_trigger_threshold: u32,
    total_released: u64,
    total_lost: u64,
    overruns: u64,
}

impl<'a> Reader<'a> {
    /// Attaches a reader to `fifo`.
    ///
    /// A throttling reader starts at the published front index. An observer
    /// starts at the current rear and sees only frames released after it attached.
    ///
    /// # Errors
    /// `NoThrottleIndex` or `ThrottlingReaderExists` when `throttles_writer`
    /// is requested but unavailable.
    pub fn new(fifo: &'a Fifo<'a>, throttles_writer: bool) -> Result<Self, FifoError> {
        let throttle_front = if throttles_writer {
            Some(fifo.attach_throttler()?)
        } else {
            None
        };
        let local_front = match throttle_front {
            Some(front) => front.load_acquire(),
            None => fifo.rear().load_acquire(),
        };
        Ok(Self {
            fifo,
            local_front,
            throttle_front,
            obtained: Obtained::default(),
            high_arm_threshold: 0,
            low_trigger_threshold: fifo.frame_count(),
            total_released: 0,
            total_lost: 0,
            overruns: 0,
        })
    }

    /// Copies up to `dst.len() / frame_size` frames out of the FIFO.
    ///
    /// If the reader had fallen behind, it resynchronizes first and reports the
    /// skipped frames in [`ReadOutcome::lost`] alongside the frames read afterwards.
    pub fn read(
        &mut self,
        dst: &mut [u8],
        timeout: Option<Duration>,
    ) -> Result<ReadOutcome, FifoError> {
        let count = dst.len() / self.fifo.frame_size() as usize;
        let (obtained, lost) = match self.obtain(count, timeout) {
            Ok(obtained) => (obtained, 0),
            Err(FifoError::Overflow { lost }) => (self.obtain(count, None)?, lost),
            Err(err) => return Err(err),
        };
        let mut copied = 0;
        for fragment in obtained.iter() {
            let src = self.fragment(fragment);
            dst[copied..copied + src.len()].copy_from_slice(src);
            copied += src.len();
        }
        let frames = obtained.frames();
        self.release(frames);
        Ok(ReadOutcome { frames, lost })
    }

    /// Bytes of an obtained fragment.
    ///
    /// # Panics
    /// If `fragment` is not inside the unreleased part of the current obtain.
    pub fn fragment(&self, fragment: Fragment) -> &[u8] {
        assert!(
            self.obtained.contains(fragment),
            "fragment {fragment:?} outside the current obtain"
        );
        let (ptr, len) = self.fifo.fragment_ptr(fragment);
        // SAFETY: the span was published by the writer with a release store and
        // observed here with an acquire load. Readers never write to the buffer.
        unsafe { std::slice::from_raw_parts(ptr, len) }
    }

    /// Frames that could be obtained right now, without resynchronizing.
    pub fn available(&self) -> Result<usize, FifoError> {
        let rear = self.fifo.rear().load_acquire();
        self.fifo
            .geometry()
            .diff(rear, self.local_front)
            .map(|filled| filled as usize)
    }

    pub fn is_throttling(&self) -> bool {
        self.throttle_front.is_some()
    }

    /// Frames skipped across all overflows.
    pub fn total_lost(&self) -> u64 {
        self.total_lost
    }

    /// Number of overflows detected.
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    pub fn total_released(&self) -> u64 {
        self.total_released
    }

    /// Accepted and range-checked, currently inert.
    pub fn set_high_arm_threshold(&mut self, level: u32) -> Result<(), FifoError> {
        self.high_arm_threshold = self.check_level(level)?;
        Ok(())
    }

    /// Accepted and range-checked, currently inert.
    pub fn set_low_trigger_threshold(&mut self, level: u32) -> Result<(), FifoError> {
        self.low_trigger_threshold = self.check_level(level)?;
        Ok(())
    }

    pub fn high_arm_threshold(&self) -> u32 {
        self.high_arm_threshold
    }

    pub fn low_trigger_threshold(&self) -> u32 {
        self.low_trigger_threshold
    }

    fn check_level(&self, level: u32) -> Result<u32, FifoError> {
        let max = self.fifo.frame_count();
        if level > max {
            return Err(FifoError::InvalidThreshold { value: level, max });
        }
        Ok(level)
    }

    /// Skips to the newest `frame_count` frames behind `rear`.
    fn resync(&mut self, rear: u32, lost: usize) {
        self.local_front = rear.wrapping_sub(self.fifo.geometry().frame_count_p2());
        if let Some(front) = self.throttle_front {
            front.store_release(self.local_front);
        }
        self.total_lost += lost as u64;
        self.overruns += 1;
        debug!(lost, rear, front = self.local_front, "reader overflow, resynchronized");
    }
}

impl Provider for Reader<'_> {
    fn obtain(&mut self, count: usize, timeout: Option<Duration>) -> Result<Obtained, FifoError> {
        self.obtained = Obtained::default();
        let count = count.min(self.fifo.frame_count() as usize) as u32;
        let rear_index = self.fifo.rear();
        let sync = self.fifo.rear_sync();
        let deadline = deadline(timeout);
        let rear = loop {
            let rear = rear_index.load_acquire();
            if count == 0 || rear != self.local_front || !sync.blocks() {
                break rear;
            }
            let Some(left) = deadline.and_then(remaining) else {
                break rear;
            };
            sync.wait(rear_index, rear, left);
        };
        let filled = match self.fifo.geometry().diff(rear, self.local_front) {
            Ok(filled) => filled,
            Err(FifoError::Overflow { lost }) => {
                self.resync(rear, lost);
                return Err(FifoError::Overflow { lost });
            }
            Err(err) => {
                error!(rear, front = self.local_front, "reader saw corrupted fifo indices");
                return Err(err);
            }
        };
        let frames = filled.min(count);
        self.obtained = Obtained::split(self.fifo.geometry(), self.local_front, frames);
        Ok(self.obtained)
    }

    fn release(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        let held = self.obtained.frames();
        assert!(count <= held, "released {count} frames but only {held} obtained");
        let count = count as u32;
        self.local_front = self.fifo.geometry().sum(self.local_front, count);
        if let Some(front) = self.throttle_front {
            front.store_release(self.local_front);
            self.fifo.front_sync().wake_all(front);
        }
        let unreleased = held as u32 - count;
        self.obtained = Obtained::split(self.fifo.geometry(), self.local_front, unreleased);
        self.total_released += count as u64;
    }

    fn obtained(&self) -> usize {
        self.obtained.frames()
    }
}

impl Drop for Reader<'_> {
    fn drop(&mut self) {
        if self.throttle_front.is_some() {
            self.fifo.detach_throttler();
        }
    }
}
