//! Wait/wake on a FIFO index.
//!
//! The core only decides *when* to wait and *when* to wake; this module is the
//! mechanism. The contract is "wait on index A while it still holds `expected`,
//! for at most `timeout`" and "wake every waiter on index A". Waits may return
//! early for any reason, so callers always re-check the index and their deadline.

use crate::index::FifoIndex;
use std::time::Duration;

/// Poll interval used by [`SyncMode::Sleep`].
const SLEEP_SLICE: Duration = Duration::from_millis(1);

/// How waiters block on an index and how they are woken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Never blocks, never wakes. Timeouts are ignored.
    None,
    /// Polls by sleeping; wakes are no-ops.
    Sleep,
    /// Futex restricted to one address space.
    FutexPrivate,
    /// Futex usable across processes sharing the mapping.
    #[default]
    FutexShared,
}

impl SyncMode {
    /// Whether a positive timeout may suspend the caller in this mode.
    #[inline(always)]
    pub fn blocks(self) -> bool {
        self != SyncMode::None
    }

    /// Suspends the calling thread while `index` holds `expected`, at most `timeout`.
    pub(crate) fn wait(self, index: &FifoIndex, expected: u32, timeout: Duration) {
        match self {
            SyncMode::None => {}
            SyncMode::Sleep => std::thread::sleep(timeout.min(SLEEP_SLICE)),
            SyncMode::FutexPrivate => futex::wait(index, expected, timeout, true),
            SyncMode::FutexShared => futex::wait(index, expected, timeout, false),
        }
    }

    /// Wakes every thread waiting on `index`. Returns how many were woken,
    /// where the mechanism can tell.
    pub(crate) fn wake_all(self, index: &FifoIndex) -> usize {
        match self {
            SyncMode::None | SyncMode::Sleep => 0,
            SyncMode::FutexPrivate => futex::wake_all(index, true),
            SyncMode::FutexShared => futex::wake_all(index, false),
        }
    }
}

#[cfg(target_os = "linux")]
mod futex {
    use crate::index::FifoIndex;
    use std::ptr;
    use std::time::Duration;

    pub fn wait(index: &FifoIndex, expected: u32, timeout: Duration, private: bool) {
        let ts = libc::timespec {
            tv_sec: timeout.as_secs().min(i32::MAX as u64) as _,
            tv_nsec: timeout.subsec_nanos() as _,
        };
        let op = if private {
            libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG
        } else {
            libc::FUTEX_WAIT
        };
        // EAGAIN, EINTR and ETIMEDOUT all send the caller back to re-check.
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                index.word().as_ptr(),
                op,
                expected,
                &ts as *const libc::timespec,
                ptr::null::<u32>(),
                0u32,
            );
        }
    }

    pub fn wake_all(index: &FifoIndex, private: bool) -> usize {
        let op = if private {
            libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG
        } else {
            libc::FUTEX_WAKE
        };
        let woken = unsafe {
            libc::syscall(
                libc::SYS_futex,
                index.word().as_ptr(),
                op,
                i32::MAX,
                ptr::null::<libc::timespec>(),
                ptr::null::<u32>(),
                0u32,
            )
        };
        if woken < 0 { 0 } else { woken as usize }
    }
}

#[cfg(not(target_os = "linux"))]
mod futex {
    use crate::index::FifoIndex;
    use std::time::Duration;

    pub fn wait(index: &FifoIndex, expected: u32, timeout: Duration, _private: bool) {
        if index.load_acquire() == expected {
            std::thread::sleep(timeout.min(super::SLEEP_SLICE));
        }
    }

    pub fn wake_all(_index: &FifoIndex, _private: bool) -> usize {
        0
    }
}
