//! Frame types carried through cadence FIFOs.
//!
//! A frame is one fixed-size unit of transfer: here, one interleaved sample
//! per channel. Frame types are `#[repr(C)]`, padding-free and `Copy`, so a
//! slice of frames can be viewed as bytes and handed straight to a FIFO.

pub mod stereo;
pub use stereo::StereoFrame;

/// Plain-old-data frames that can be reinterpreted as raw bytes.
///
/// # Safety
/// Implementors must be `#[repr(C)]` with no padding bytes and no invalid bit
/// patterns, so that any byte sequence of the right length is a valid value.
pub unsafe trait Frame: Copy + Default {
    /// Size of one frame in bytes, as passed to the FIFO constructor.
    const SIZE: u32 = std::mem::size_of::<Self>() as u32;
}

/// Views a slice of frames as bytes.
pub fn as_bytes<F: Frame>(frames: &[F]) -> &[u8] {
    // SAFETY: F has no padding, so every byte of the slice is initialized.
    unsafe { std::slice::from_raw_parts(frames.as_ptr().cast(), std::mem::size_of_val(frames)) }
}

/// Views a mutable slice of frames as bytes.
pub fn as_bytes_mut<F: Frame>(frames: &mut [F]) -> &mut [u8] {
    // SAFETY: any byte pattern is a valid F.
    unsafe {
        std::slice::from_raw_parts_mut(frames.as_mut_ptr().cast(), std::mem::size_of_val(frames))
    }
}
