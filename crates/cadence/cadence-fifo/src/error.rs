use std::io;

/// Errors surfaced by FIFO construction and the obtain/release protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FifoError {
    #[error("frame count must be > 0")]
    ZeroFrameCount,

    #[error("frame size must be > 0")]
    ZeroFrameSize,

    #[error("{frame_count} frames of {frame_size} bytes exceed the transfer size range")]
    CapacityTooLarge { frame_count: u32, frame_size: u32 },

    #[error("buffer holds {actual} bytes, {needed} required")]
    BufferTooSmall { needed: usize, actual: usize },

    /// The two indices cannot come from any legal writer/reader history.
    /// Fatal for the FIFO instance.
    #[error("corrupted indices: rear={rear:#x} front={front:#x}")]
    CorruptedIndices { rear: u32, front: u32 },

    /// The reader fell more than a full buffer behind the writer. Recoverable:
    /// the reader has already been resynchronized when this is returned.
    #[error("reader overflow, ~{lost} frames lost")]
    Overflow { lost: usize },

    #[error("threshold {value} out of range (max {max})")]
    InvalidThreshold { value: u32, max: u32 },

    #[error("a writer is already attached to this fifo")]
    WriterExists,

    #[error("a throttling reader is already attached to this fifo")]
    ThrottlingReaderExists,

    #[error("fifo was built without a throttling front index")]
    NoThrottleIndex,
}

impl FifoError {
    /// The classic negative errno for this error, for callers bridging to a C-style surface.
    pub fn errno(&self) -> i32 {
        match self {
            FifoError::CorruptedIndices { .. } => -libc::EIO,
            FifoError::Overflow { .. } => -libc::EOVERFLOW,
            FifoError::WriterExists | FifoError::ThrottlingReaderExists => -libc::EBUSY,
            _ => -libc::EINVAL,
        }
    }

    /// Whether the caller may continue using the FIFO after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FifoError::Overflow { .. })
    }
}

/// Errors from creating or opening a FIFO backed by a shared file.
#[derive(Debug, thiserror::Error)]
pub enum ShmError {
    #[error("shared fifo file i/o")]
    Io(#[from] io::Error),

    #[error("bad magic {0:#x}")]
    BadMagic(u64),

    #[error("unsupported layout version {found} (expected {expected})")]
    WrongVersion { expected: u32, found: u32 },

    #[error("mapping holds {actual} bytes, header describes {needed}")]
    Truncated { needed: usize, actual: usize },

    #[error(transparent)]
    Geometry(#[from] FifoError),
}
