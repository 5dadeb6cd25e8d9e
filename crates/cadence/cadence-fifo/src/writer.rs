//! The producer side of a FIFO.
//!
//! # Wake hysteresis
//!
//! A reader blocked in `obtain` sleeps on the rear index. Waking it on every
//! release is wasteful at audio rates, so the writer debounces with a pair of
//! watermarks. Each release computes the fill level it leaves behind, relative
//! to the throttling reader, and checks it against both:
//!
//! ```text
//!            fill <= low_arm_threshold
//!   DISARMED --------------------------> ARMED
//!      ^                                   |
//!      |   fill >= high_trigger_threshold  |
//!      +---------- wake readers <----------+
//! ```
//!
//! Arming is checked first, so a release that satisfies both thresholds at
//! once wakes. The defaults (`low = frame_count`, `high = 0`) wake on every release.
//! Without a throttling front there is no fill level to compare and every
//! non-empty release wakes.

use crate::error::FifoError;
use crate::fifo::Fifo;
use crate::provider::{Fragment, Obtained, Provider, deadline, remaining};
use std::time::Duration;
use tracing::error;

pub struct Writer<'a> {
    fifo: &'a Fifo<'a>,
    /// Index of the next frame slot to write. Shadow of the shared rear.
    local_rear: u32,
    /// Unreleased part of the last obtain.
    obtained: Obtained,
    low_arm_threshold: u32,
    high_trigger_threshold: u32,
    armed: bool,
    effective_frames: u32,
    total_released: u64,
    wakes: u64,
}

impl<'a> Writer<'a> {
    /// Attaches the single writer of `fifo`.
    ///
    /// The writer resumes from the rear index currently published in the FIFO.
    pub fn new(fifo: &'a Fifo<'a>) -> Result<Self, FifoError> {
        fifo.attach_writer()?;
        let frame_count = fifo.frame_count();
        Ok(Self {
            fifo,
            local_rear: fifo.rear().load_acquire(),
            obtained: Obtained::default(),
            low_arm_threshold: frame_count,
            high_trigger_threshold: 0,
            // Initial fill of zero is below the default low threshold.
            armed: true,
            effective_frames: frame_count,
            total_released: 0,
            wakes: 0,
        })
    }

    /// Copies whole frames from `src` into the FIFO, returning how many were written.
    ///
    /// Writes fewer frames than `src` holds, possibly zero, when the FIFO is
    /// full or nearly full. Trailing bytes that do not form a whole frame are ignored.
    pub fn write(&mut self, src: &[u8], timeout: Option<Duration>) -> Result<usize, FifoError> {
        let frame_size = self.fifo.frame_size() as usize;
        let obtained = self.obtain(src.len() / frame_size, timeout)?;
        let mut copied = 0;
        for fragment in obtained.iter() {
            let dst = self.fragment_mut(fragment);
            let len = dst.len();
            dst.copy_from_slice(&src[copied..copied + len]);
            copied += len;
        }
        let frames = obtained.frames();
        self.release(frames);
        Ok(frames)
    }

    /// Mutable bytes of an obtained fragment.
    ///
    /// # Panics
    /// If `fragment` is not inside the unreleased part of the current obtain.
    pub fn fragment_mut(&mut self, fragment: Fragment) -> &mut [u8] {
        assert!(
            self.obtained.contains(fragment),
            "fragment {fragment:?} outside the current obtain"
        );
        let (ptr, len) = self.fifo.fragment_ptr(fragment);
        // SAFETY: the writer is the only mutator of the buffer and the span is
        // part of its obtain, between rear and the throttling front.
        unsafe { std::slice::from_raw_parts_mut(ptr, len) }
    }

    /// Frames that could be obtained right now without blocking.
    pub fn available(&self) -> Result<usize, FifoError> {
        match self.fifo.throttle_front() {
            Some(front) => {
                let filled = self.filled(front.load_acquire())?;
                Ok(self.effective_frames.saturating_sub(filled) as usize)
            }
            None => Ok(self.effective_frames as usize),
        }
    }

    /// Arm the wake trigger once the fill level drops to `level` or below.
    pub fn set_low_arm_threshold(&mut self, level: u32) -> Result<(), FifoError> {
        self.low_arm_threshold = self.check_level(level)?;
        Ok(())
    }

    /// Wake readers when armed and the fill level reaches `level`.
    pub fn set_high_trigger_threshold(&mut self, level: u32) -> Result<(), FifoError> {
        self.high_trigger_threshold = self.check_level(level)?;
        Ok(())
    }

    pub fn set_hysteresis(&mut self, low_arm: u32, high_trigger: u32) -> Result<(), FifoError> {
        let low_arm = self.check_level(low_arm)?;
        self.high_trigger_threshold = self.check_level(high_trigger)?;
        self.low_arm_threshold = low_arm;
        Ok(())
    }

    /// Limits the usable capacity to `frames` (at most `frame_count`) without
    /// rebuilding the FIFO, e.g. to bound latency.
    pub fn set_effective_frame_count(&mut self, frames: u32) -> Result<(), FifoError> {
        self.effective_frames = self.check_level(frames)?;
        Ok(())
    }

    pub fn low_arm_threshold(&self) -> u32 {
        self.low_arm_threshold
    }

    pub fn high_trigger_threshold(&self) -> u32 {
        self.high_trigger_threshold
    }

    pub fn effective_frame_count(&self) -> u32 {
        self.effective_frames
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Number of times readers were signaled.
    pub fn wakes(&self) -> u64 {
        self.wakes
    }

    pub fn total_released(&self) -> u64 {
        self.total_released
    }

    fn check_level(&self, level: u32) -> Result<u32, FifoError> {
        let max = self.fifo.frame_count();
        if level > max {
            return Err(FifoError::InvalidThreshold { value: level, max });
        }
        Ok(level)
    }

    /// Fill level seen by the writer. The writer never overflows, so any
    /// inconsistency is corruption.
    fn filled(&self, front: u32) -> Result<u32, FifoError> {
        self.fifo
            .geometry()
            .diff(self.local_rear, front)
            .map_err(|_| {
                error!(rear = self.local_rear, front, "writer saw corrupted fifo indices");
                FifoError::CorruptedIndices {
                    rear: self.local_rear,
                    front,
                }
            })
    }

    #[inline]
    fn publish(&mut self, count: u32) {
        self.local_rear = self.fifo.geometry().sum(self.local_rear, count);
        self.fifo.rear().store_release(self.local_rear);
    }

    #[inline]
    fn wake_readers(&mut self) {
        self.fifo.rear_sync().wake_all(self.fifo.rear());
        self.wakes += 1;
    }
}

impl Provider for Writer<'_> {
    fn obtain(&mut self, count: usize, timeout: Option<Duration>) -> Result<Obtained, FifoError> {
        self.obtained = Obtained::default();
        let count = count.min(self.fifo.frame_count() as usize) as u32;
        let available = match self.fifo.throttle_front() {
            None => self.effective_frames,
            Some(front_index) => {
                let deadline = deadline(timeout);
                let sync = self.fifo.front_sync();
                loop {
                    let front = front_index.load_acquire();
                    let available = self.effective_frames.saturating_sub(self.filled(front)?);
                    if count == 0 || available > 0 || !sync.blocks() {
                        break available;
                    }
                    let Some(left) = deadline.and_then(remaining) else {
                        break 0;
                    };
                    sync.wait(front_index, front, left);
                }
            }
        };
        let frames = available.min(count);
        self.obtained = Obtained::split(self.fifo.geometry(), self.local_rear, frames);
        Ok(self.obtained)
    }

    fn release(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        let held = self.obtained.frames();
        assert!(count <= held, "released {count} frames but only {held} obtained");
        let count = count as u32;
        match self.fifo.throttle_front() {
            Some(front_index) => {
                let filled = self
                    .fifo
                    .geometry()
                    .diff(self.local_rear, front_index.load_acquire());
                self.publish(count);
                if let Ok(filled) = filled {
                    let filled = filled + count;
                    if filled <= self.low_arm_threshold {
                        self.armed = true;
                    }
                    if self.armed && filled >= self.high_trigger_threshold {
                        self.wake_readers();
                        self.armed = false;
                    }
                }
            }
            None => {
                self.publish(count);
                self.wake_readers();
            }
        }
        let unreleased = held as u32 - count;
        self.obtained = Obtained::split(self.fifo.geometry(), self.local_rear, unreleased);
        self.total_released += count as u64;
    }

    fn obtained(&self) -> usize {
        self.obtained.frames()
    }
}

impl Drop for Writer<'_> {
    fn drop(&mut self) {
        self.fifo.detach_writer();
    }
}
