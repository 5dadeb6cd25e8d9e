//! The two-phase obtain/release contract shared by writers and readers.

use crate::error::FifoError;
use crate::geometry::Geometry;
use std::time::{Duration, Instant};

/// One physically contiguous run of frames, in frames relative to the start
/// of the FIFO buffer. `offset` is meaningless when `length == 0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fragment {
    pub offset: u32,
    pub length: u32,
}

/// The result of an obtain: a logically contiguous run of frames split at the
/// physical end of the buffer. The second fragment, when non-empty, always
/// starts at offset 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Obtained {
    pub fragments: [Fragment; 2],
}

impl Obtained {
    pub(crate) fn split(geometry: &Geometry, index: u32, count: u32) -> Self {
        let offset = geometry.offset(index);
        let first = (geometry.frame_count() - offset).min(count);
        Self {
            fragments: [
                Fragment {
                    offset,
                    length: first,
                },
                Fragment {
                    offset: 0,
                    length: count - first,
                },
            ],
        }
    }

    /// Total frames across both fragments.
    #[inline]
    pub fn frames(&self) -> usize {
        self.fragments[0].length as usize + self.fragments[1].length as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Whether the run crosses the physical end of the buffer.
    pub fn is_split(&self) -> bool {
        self.fragments[1].length > 0
    }

    /// Whether `fragment` lies inside one of these fragments. An empty
    /// fragment is always contained.
    pub fn contains(&self, fragment: Fragment) -> bool {
        let end = |f: Fragment| f.offset as u64 + f.length as u64;
        fragment.length == 0
            || self
                .iter()
                .any(|f| fragment.offset >= f.offset && end(fragment) <= end(f))
    }

    /// The non-empty fragments, in transfer order.
    pub fn iter(&self) -> impl Iterator<Item = Fragment> + '_ {
        self.fragments.iter().copied().filter(|f| f.length > 0)
    }
}

/// Two-phase access to a FIFO.
///
/// `obtain` reserves up to `count` frames without publishing anything; the
/// caller copies frames in (writer) or out (reader) and then calls `release`,
/// which is the only step that makes progress visible to the other side.
///
/// A `timeout` of `None` or zero never blocks. A positive timeout suspends the
/// calling thread until at least one frame is available or the timeout elapses.
/// A timeout that elapses is not an error: the obtain just returns zero frames.
pub trait Provider {
    /// Reserves up to `count` frames. `count` is a maximum: fewer frames,
    /// including zero, is a normal result. Replaces any unreleased remainder
    /// of a previous obtain.
    fn obtain(&mut self, count: usize, timeout: Option<Duration>) -> Result<Obtained, FifoError>;

    /// Publishes the first `count` frames of the last obtain.
    ///
    /// # Panics
    /// If `count` exceeds [`Provider::obtained`].
    fn release(&mut self, count: usize);

    /// Frames obtained and not yet released.
    fn obtained(&self) -> usize;
}

/// Deadline for a blocking obtain, or `None` when the caller must not block.
#[inline]
pub(crate) fn deadline(timeout: Option<Duration>) -> Option<Instant> {
    match timeout {
        Some(t) if !t.is_zero() => Some(Instant::now() + t),
        _ => None,
    }
}

/// Time left until `deadline`, or `None` once it has passed.
#[inline]
pub(crate) fn remaining(deadline: Instant) -> Option<Duration> {
    let now = Instant::now();
    (now < deadline).then(|| deadline - now)
}
