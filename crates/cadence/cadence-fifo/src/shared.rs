//! A FIFO living in a file mapped by two processes.
//!
//! The creating side lays down the header and initializes both indices; the
//! other side opens the file and validates it. Each side then builds a
//! shared-mode [`Fifo`] over the mapping and attaches its writer or reader.

use crate::error::{FifoError, ShmError};
use crate::fifo::Fifo;
use crate::shm_layout::{FifoHeader, bytes_for_fifo};
use cadence_mmap::SharedMapping;
use std::mem::size_of;
use std::path::Path;
use std::ptr;
use tracing::info;

pub struct SharedFifo {
    _mapping: SharedMapping,
    base: *mut u8,
}

// SAFETY: the mapping is owned by this value; all concurrent access to it goes
// through atomics or the obtain/release protocol.
unsafe impl Send for SharedFifo {}

impl SharedFifo {
    /// Creates the file at `path` and performs the one-time index initialization.
    ///
    /// Any existing file is truncated. No other process may be using the FIFO
    /// while it is being created.
    pub fn create<P: AsRef<Path>>(
        path: P,
        frame_count: u32,
        frame_size: u32,
        throttled: bool,
    ) -> Result<Self, ShmError> {
        let bytes = bytes_for_fifo(frame_count, frame_size)?;
        let mut mapping = SharedMapping::create(&path, bytes as u64)?;
        let base = mapping.as_mut_ptr();

        // SAFETY: the mapping is fresh, page aligned and at least one header long.
        unsafe {
            ptr::write(
                base as *mut FifoHeader,
                FifoHeader::new(frame_count, frame_size, throttled),
            );
        }

        info!(
            path = %path.as_ref().display(),
            frame_count,
            frame_size,
            throttled,
            "created shared fifo"
        );
        Ok(Self {
            _mapping: mapping,
            base,
        })
    }

    /// Opens a FIFO file created by [`SharedFifo::create`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ShmError> {
        let mut mapping = SharedMapping::open(&path)?;
        if mapping.len() < size_of::<FifoHeader>() {
            return Err(ShmError::Truncated {
                needed: size_of::<FifoHeader>(),
                actual: mapping.len(),
            });
        }
        let base = mapping.as_mut_ptr();
        // SAFETY: the mapping holds at least a header; validate() rejects garbage.
        let header = unsafe { &*(base as *const FifoHeader) };
        header.validate(mapping.len())?;

        info!(
            path = %path.as_ref().display(),
            frame_count = header.frame_count,
            frame_size = header.frame_size,
            throttled = header.is_throttled(),
            "opened shared fifo"
        );
        Ok(Self {
            _mapping: mapping,
            base,
        })
    }

    #[inline(always)]
    fn header(&self) -> &FifoHeader {
        // SAFETY: base points to a header initialized by create() or validated by open().
        unsafe { &*(self.base as *const FifoHeader) }
    }

    pub fn frame_count(&self) -> u32 {
        self.header().frame_count
    }

    pub fn frame_size(&self) -> u32 {
        self.header().frame_size
    }

    pub fn is_throttled(&self) -> bool {
        self.header().is_throttled()
    }

    /// A shared-mode FIFO over this mapping.
    pub fn fifo(&mut self) -> Result<Fifo<'_>, FifoError> {
        let (frame_count, frame_size) = (self.frame_count(), self.frame_size());
        let len = frame_count as usize * frame_size as usize;
        // SAFETY: the header was validated against the mapping length, so the
        // data region lies inside the mapping. The exclusive borrow of self
        // prevents building two FIFOs over the same region in this process.
        let (header, data) = unsafe {
            (
                &*(self.base as *const FifoHeader),
                std::slice::from_raw_parts_mut(self.base.add(size_of::<FifoHeader>()), len),
            )
        };
        let front = header.is_throttled().then_some(&header.front.index);
        Fifo::shared(frame_count, frame_size, data, &header.rear.index, front)
    }
}
