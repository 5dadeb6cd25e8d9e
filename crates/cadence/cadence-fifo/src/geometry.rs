//! Index arithmetic for FIFOs of arbitrary (not just power-of-two) capacity.
//!
//! Indices advance through a power-of-two index space so wraparound is a mask,
//! but the caller's exact `frame_count` is honored: the `fudge_factor` index
//! values past `frame_count` in every generation are skipped by [`Geometry::sum`].
//! Only index values are wasted, never buffer memory.
//!
//! ```text
//! frame_count = 6, frame_count_p2 = 8, fudge_factor = 2
//!
//! logical frame   0 1 2 3 4 5 | 6 7 8 ...
//! index           0 1 2 3 4 5 | 8 9 10 ...   (6 and 7 never used)
//!                 generation 0  generation 1
//! ```

use crate::error::FifoError;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Geometry {
    frame_count: u32,
    frame_count_p2: u32,
    fudge_factor: u32,
}

impl Geometry {
    pub fn new(frame_count: u32) -> Result<Self, FifoError> {
        if frame_count == 0 {
            return Err(FifoError::ZeroFrameCount);
        }
        // The fill level is reported as a non-negative i32.
        if frame_count > i32::MAX as u32 {
            return Err(FifoError::CapacityTooLarge {
                frame_count,
                frame_size: 1,
            });
        }
        let frame_count_p2 = frame_count.next_power_of_two();
        Ok(Self {
            frame_count,
            frame_count_p2,
            fudge_factor: frame_count_p2 - frame_count,
        })
    }

    #[inline(always)]
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    #[inline(always)]
    pub fn frame_count_p2(&self) -> u32 {
        self.frame_count_p2
    }

    #[inline(always)]
    pub fn fudge_factor(&self) -> u32 {
        self.fudge_factor
    }

    #[inline(always)]
    fn mask(&self) -> u32 {
        self.frame_count_p2 - 1
    }

    /// Physical frame offset of a validated index, in `[0, frame_count)`.
    #[inline(always)]
    pub(crate) fn offset(&self, index: u32) -> u32 {
        index & self.mask()
    }

    /// `index + increment`, skipping the wasted index range at the end of
    /// each generation.
    ///
    /// `index` must be a validated front or rear and `increment <= frame_count`.
    #[inline]
    pub(crate) fn sum(&self, index: u32, increment: u32) -> u32 {
        debug_assert!(increment <= self.frame_count);
        if self.fudge_factor == 0 {
            return index.wrapping_add(increment);
        }
        let offset = self.offset(index);
        debug_assert!(offset < self.frame_count);
        let mut increment = increment;
        if offset + increment >= self.frame_count {
            increment += self.fudge_factor;
        }
        index.wrapping_add(increment)
    }

    /// Fill level `rear - front`, in `[0, frame_count]`.
    ///
    /// Both indices may be unvalidated values read from shared memory.
    ///
    /// # Errors
    /// - `Overflow { lost }` when the writer is more than `frame_count` frames
    ///   ahead; `lost` is the number of frames no longer in the buffer.
    /// - `CorruptedIndices` when the pair cannot come from any legal history:
    ///   an index lands in the wasted range, or front is ahead of rear.
    ///   A lag of 2^31 frames or more is also reported this way.
    pub(crate) fn diff(&self, rear: u32, front: u32) -> Result<u32, FifoError> {
        let mut diff = rear.wrapping_sub(front);
        if self.fudge_factor != 0 {
            let mask = self.mask();
            if (rear & mask) >= self.frame_count || (front & mask) >= self.frame_count {
                return Err(FifoError::CorruptedIndices { rear, front });
            }
            // Always a multiple of frame_count_p2.
            let gen_diff = (rear & !mask).wrapping_sub(front & !mask);
            if gen_diff == self.frame_count_p2 {
                // One generation ahead: step over the wasted indices. The raw
                // difference may reach 2^31 here when frame_count_p2 is 2^31.
                diff -= self.fudge_factor;
                if diff > self.frame_count {
                    return Err(FifoError::Overflow {
                        lost: (diff - self.frame_count) as usize,
                    });
                }
                return Ok(diff);
            }
            if gen_diff > self.frame_count_p2 && (diff as i32) >= 0 {
                let generations = gen_diff / self.frame_count_p2;
                let lag = diff - self.fudge_factor * generations;
                return Err(FifoError::Overflow {
                    lost: (lag - self.frame_count) as usize,
                });
            }
        }
        if (diff as i32) < 0 {
            return Err(FifoError::CorruptedIndices { rear, front });
        }
        if diff > self.frame_count {
            return Err(FifoError::Overflow {
                lost: (diff - self.frame_count) as usize,
            });
        }
        Ok(diff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Index of the `n`th logical frame.
    fn index_of(g: &Geometry, n: u64) -> u32 {
        let fc = g.frame_count() as u64;
        ((n / fc) * g.frame_count_p2() as u64 + n % fc) as u32
    }

    #[test]
    fn rounds_up_and_computes_fudge() {
        let g = Geometry::new(6).unwrap();
        assert_eq!((g.frame_count_p2(), g.fudge_factor()), (8, 2));
        let g = Geometry::new(8).unwrap();
        assert_eq!((g.frame_count_p2(), g.fudge_factor()), (8, 0));
        let g = Geometry::new(1).unwrap();
        assert_eq!((g.frame_count_p2(), g.fudge_factor()), (1, 0));
    }

    #[test]
    fn rejects_bad_frame_counts() {
        assert_eq!(Geometry::new(0), Err(FifoError::ZeroFrameCount));
        assert!(Geometry::new(i32::MAX as u32).is_ok());
        assert!(matches!(
            Geometry::new(i32::MAX as u32 + 1),
            Err(FifoError::CapacityTooLarge { .. })
        ));
    }

    #[test]
    fn sum_skips_wasted_indices() {
        let g = Geometry::new(6).unwrap();
        assert_eq!(g.sum(0, 5), 5);
        assert_eq!(g.sum(5, 1), 8);
        assert_eq!(g.sum(4, 4), 10);
        assert_eq!(g.sum(0, 6), 8);
        assert_eq!(g.sum(8, 6), 16);
    }

    #[test]
    fn sum_matches_logical_positions() {
        let g = Geometry::new(5).unwrap();
        let mut idx = 0u32;
        let mut n = 0u64;
        for step in [1u32, 4, 5, 3, 2, 0, 5, 1] {
            idx = g.sum(idx, step);
            n += step as u64;
            assert_eq!(idx, index_of(&g, n));
            assert!(g.offset(idx) < g.frame_count());
        }
    }

    #[test]
    fn sum_and_diff_across_u32_wrap() {
        let g = Geometry::new(6).unwrap();
        let front = 0xFFFF_FFF8 + 5;
        let rear = g.sum(front, 3);
        assert_eq!(rear, 2);
        assert_eq!(g.diff(rear, front), Ok(3));

        let g = Geometry::new(8).unwrap();
        let front = u32::MAX - 2;
        let rear = g.sum(front, 8);
        assert_eq!(g.diff(rear, front), Ok(8));
    }

    #[test]
    fn diff_in_range() {
        let g = Geometry::new(6).unwrap();
        assert_eq!(g.diff(0, 0), Ok(0));
        assert_eq!(g.diff(5, 1), Ok(4));
        assert_eq!(g.diff(index_of(&g, 7), index_of(&g, 1)), Ok(6));
        assert_eq!(g.diff(index_of(&g, 9), index_of(&g, 4)), Ok(5));
    }

    #[test]
    fn diff_overflow_reports_lost_frames() {
        let g = Geometry::new(6).unwrap();
        // 20 frames written, reader never moved: 14 are gone.
        assert_eq!(
            g.diff(index_of(&g, 20), 0),
            Err(FifoError::Overflow { lost: 14 })
        );
        // One generation apart but still more than a buffer behind.
        assert_eq!(
            g.diff(index_of(&g, 8), index_of(&g, 1)),
            Err(FifoError::Overflow { lost: 1 })
        );

        let g = Geometry::new(8).unwrap();
        assert_eq!(g.diff(19, 0), Err(FifoError::Overflow { lost: 11 }));
    }

    #[test]
    fn full_buffer_when_index_space_is_half_of_u32() {
        for fc in [(1u32 << 30) + 1, i32::MAX as u32] {
            let g = Geometry::new(fc).unwrap();
            assert_eq!(g.frame_count_p2(), 1 << 31);
            for front in [0, 5, fc - 1] {
                let rear = g.sum(front, fc);
                assert_eq!(rear.wrapping_sub(front), 1 << 31);
                assert_eq!(g.diff(rear, front), Ok(fc));
            }
            // From front = fc - 1, one frame past full spans two generations and wraps u32.
            for front in [0, 5] {
                let rear = g.sum(g.sum(front, fc), 1);
                assert_eq!(g.diff(rear, front), Err(FifoError::Overflow { lost: 1 }));
            }
            let front = g.sum(0, fc - 3);
            assert_eq!(g.diff(g.sum(front, 10), front), Ok(10));
            assert!(matches!(g.diff(0, 5), Err(FifoError::CorruptedIndices { .. })));
        }
    }

    #[test]
    fn diff_detects_corruption() {
        let g = Geometry::new(6).unwrap();
        // Index in the wasted range.
        assert!(matches!(g.diff(7, 0), Err(FifoError::CorruptedIndices { .. })));
        assert!(matches!(g.diff(8, 6), Err(FifoError::CorruptedIndices { .. })));
        // Front ahead of rear.
        assert!(matches!(g.diff(2, 4), Err(FifoError::CorruptedIndices { .. })));

        let g = Geometry::new(8).unwrap();
        assert!(matches!(g.diff(0, 1), Err(FifoError::CorruptedIndices { .. })));
    }
}
