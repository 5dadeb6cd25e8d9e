//! Binary layout of a FIFO file shared between processes.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐  offset 0
//! │ magic (8B) │ version │ frame_count │ frame_size │ flags │ pad │
//! ├──────────────────────────────────────────────────────────────┤  64
//! │ rear: FifoIndex (writer publishes)                   │ pad   │
//! ├──────────────────────────────────────────────────────────────┤  128
//! │ front: FifoIndex (throttling reader publishes)       │ pad   │
//! ├──────────────────────────────────────────────────────────────┤  192
//! │ frame_count * frame_size bytes of frames                     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each index sits on its own cache line so the two publishers do not
//! contend. Both sides must run on the same architecture: index words are
//! stored in native byte order.

use crate::error::ShmError;
use crate::fifo::capacity_bytes;
use crate::index::FifoIndex;
use std::mem::size_of;

/// "CADENCEF" in ASCII.
pub const FIFO_MAGIC: u64 = 0x4341_4445_4E43_4546;

/// Bump on any incompatible layout change.
pub const FIFO_VERSION: u32 = 1;

/// The file has a throttling front index in use.
pub const FLAG_THROTTLED: u32 = 1 << 0;

#[repr(C, align(64))]
pub struct IndexLine {
    pub index: FifoIndex,
}

#[repr(C)]
pub struct FifoHeader {
    pub magic: u64,
    pub version: u32,
    pub frame_count: u32,
    pub frame_size: u32,
    pub flags: u32,
    _reserved: [u8; 40],
    pub rear: IndexLine,
    pub front: IndexLine,
}

const _: () = assert!(size_of::<FifoHeader>() == 192);

impl FifoHeader {
    /// A header with both indices at zero. Written in place exactly once,
    /// by the process that creates the file.
    pub fn new(frame_count: u32, frame_size: u32, throttled: bool) -> Self {
        Self {
            magic: FIFO_MAGIC,
            version: FIFO_VERSION,
            frame_count,
            frame_size,
            flags: if throttled { FLAG_THROTTLED } else { 0 },
            _reserved: [0; 40],
            rear: IndexLine {
                index: FifoIndex::new(0),
            },
            front: IndexLine {
                index: FifoIndex::new(0),
            },
        }
    }

    pub fn is_throttled(&self) -> bool {
        self.flags & FLAG_THROTTLED != 0
    }

    /// Checks that the header describes a FIFO that fits in `mapped_len` bytes.
    pub fn validate(&self, mapped_len: usize) -> Result<(), ShmError> {
        if self.magic != FIFO_MAGIC {
            return Err(ShmError::BadMagic(self.magic));
        }
        if self.version != FIFO_VERSION {
            return Err(ShmError::WrongVersion {
                expected: FIFO_VERSION,
                found: self.version,
            });
        }
        let needed = bytes_for_fifo(self.frame_count, self.frame_size)?;
        if mapped_len < needed {
            return Err(ShmError::Truncated {
                needed,
                actual: mapped_len,
            });
        }
        Ok(())
    }
}

/// Total file size for a FIFO of the given dimensions.
pub fn bytes_for_fifo(frame_count: u32, frame_size: u32) -> Result<usize, ShmError> {
    Ok(size_of::<FifoHeader>() + capacity_bytes(frame_count, frame_size)?)
}
