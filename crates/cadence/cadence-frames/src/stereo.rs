use crate::Frame;

/// One 16-bit PCM sample for each of two channels.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StereoFrame {
    pub left: i16,
    pub right: i16,
}

const _: () = assert!(std::mem::size_of::<StereoFrame>() == 4);

// SAFETY: two i16 fields, no padding, every bit pattern valid.
unsafe impl Frame for StereoFrame {}

impl StereoFrame {
    pub const fn new(left: i16, right: i16) -> Self {
        Self { left, right }
    }

    /// The frame at position `n` of a sine tone with `period` frames per cycle.
    /// Left and right are a quarter cycle apart.
    pub fn sine(n: u64, period: u32, amplitude: i16) -> Self {
        let phase = (n % period as u64) as f64 / period as f64 * std::f64::consts::TAU;
        let a = amplitude as f64;
        Self {
            left: (phase.sin() * a) as i16,
            right: (phase.cos() * a) as i16,
        }
    }
}
