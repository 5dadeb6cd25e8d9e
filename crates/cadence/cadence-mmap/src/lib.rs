//! File-backed shared mappings for cross-process FIFOs.
//!
//! Both sides of a shared FIFO map the same file read-write: the writer
//! publishes its rear index and the throttling reader publishes its front
//! index, so neither side can use a read-only view.

use memmap2::MmapMut;
use std::{
    fs::{File, OpenOptions},
    io,
    path::Path,
};

pub struct SharedMapping {
    _file: File,
    mmap: MmapMut,
}

impl SharedMapping {
    /// Create (or truncate) the file at `path`, size it to `size_bytes` and map it read-write.
    ///
    /// The new region is zero-filled by the kernel.
    pub fn create<P: AsRef<Path>>(path: P, size_bytes: u64) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        file.set_len(size_bytes)?;

        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self { _file: file, mmap })
    }

    /// Map an existing file read-write.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self { _file: file, mmap })
    }

    /// Raw pointer to the first byte of the mapping.
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.mmap.as_mut_ptr()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }
}
