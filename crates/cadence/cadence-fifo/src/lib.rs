//! Lock-free circular FIFO of fixed-size frames for one writer and one or more readers.
//!
//! Frames move through a caller-owned buffer coordinated by two 32-bit
//! indices: the writer's rear and, optionally, the front of one throttling
//! reader. Both sides use a two-phase [`Provider::obtain`] / [`Provider::release`]
//! protocol; the release-store of an index is the only point of
//! synchronization, so frame data written before a release is visible to any
//! reader that acquires the new index.
//!
//! The FIFO works within one process ([`Fifo::new`]) or across two processes
//! that map the same memory ([`Fifo::shared`], [`SharedFifo`]).
//!
//! ```
//! use cadence_fifo::{Fifo, Reader, Writer};
//!
//! let mut buffer = vec![0u8; 8 * 4];
//! let fifo = Fifo::new(8, 4, &mut buffer, true)?;
//! let mut writer = Writer::new(&fifo)?;
//! let mut reader = Reader::new(&fifo, true)?;
//!
//! assert_eq!(writer.write(&[1, 2, 3, 4, 5, 6, 7, 8], None)?, 2);
//! let mut out = [0u8; 8];
//! assert_eq!(reader.read(&mut out, None)?.frames, 2);
//! assert_eq!(out, [1, 2, 3, 4, 5, 6, 7, 8]);
//! # Ok::<(), cadence_fifo::FifoError>(())
//! ```

mod error;
mod fifo;
mod geometry;
mod index;
mod provider;
mod reader;
mod shared;
mod shm_layout;
mod wait;
mod writer;

pub use error::{FifoError, ShmError};
pub use fifo::{Fifo, MAX_CAPACITY_BYTES};
pub use geometry::Geometry;
pub use index::FifoIndex;
pub use provider::{Fragment, Obtained, Provider};
pub use reader::{ReadOutcome, Reader};
pub use shared::SharedFifo;
pub use shm_layout::{FIFO_MAGIC, FIFO_VERSION, FifoHeader, bytes_for_fifo};
pub use wait::SyncMode;
pub use writer::Writer;
