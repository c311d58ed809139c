//! Platform seam for descriptor readiness
//!
//! Two implementations sit behind the same functions:
//! - **unix** - `poll(2)` over the registered descriptors, non-blocking pipes
//! - **windows** - anonymous pipes cannot be polled, so readiness is emulated by
//!   peeking at the number of bytes waiting in each pipe
//!
//! The variant is chosen at build time; nothing above this module branches on
//! the platform per call.

use std::time::Duration;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
use unix as imp;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
use windows as imp;

/// Raw OS handle of one end of a pipe
#[cfg(unix)]
pub type RawPipe = std::os::fd::RawFd;

/// Raw OS handle of one end of a pipe, stored as an address so it stays `Send`
#[cfg(windows)]
pub type RawPipe = usize;

/// Anything that exposes the raw handle of a pipe end
pub trait AsRawPipe {
    fn as_raw_pipe(&self) -> RawPipe;
}

#[cfg(unix)]
impl<T: std::os::fd::AsRawFd> AsRawPipe for T {
    fn as_raw_pipe(&self) -> RawPipe {
        self.as_raw_fd()
    }
}

#[cfg(windows)]
impl<T: std::os::windows::io::AsRawHandle> AsRawPipe for T {
    fn as_raw_pipe(&self) -> RawPipe {
        self.as_raw_handle() as usize
    }
}

/// Direction a pipe was registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interest {
    Read,
    Write,
}

impl std::fmt::Display for Interest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Interest::Read => write!(f, "read"),
            Interest::Write => write!(f, "write"),
        }
    }
}

/// One ready pipe reported by [`poll_ready`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ready {
    pub pipe: RawPipe,
    pub interest: Interest,
    /// Bytes known to be waiting, when the platform can tell cheaply
    pub available: Option<usize>,
}

/// Block until one of `reads`/`writes` is ready or `timeout` elapses.
///
/// `None` blocks indefinitely, `Some(Duration::ZERO)` only probes.
/// An empty result means the timeout elapsed.
pub fn poll_ready(
    reads: &[RawPipe],
    writes: &[RawPipe],
    timeout: Option<Duration>,
) -> std::io::Result<Vec<Ready>> {
    imp::poll_ready(reads, writes, timeout)
}

/// Put a pipe end in non-blocking mode. Idempotent.
pub fn set_non_blocking(pipe: RawPipe) -> std::io::Result<()> {
    imp::set_non_blocking(pipe)
}

/// Whether a pipe end is in blocking mode
pub fn is_blocking(pipe: RawPipe) -> std::io::Result<bool> {
    imp::is_blocking(pipe)
}
