//! Peek-based readiness emulation for anonymous pipes
//!
//! Anonymous pipes on Windows cannot be waited on for readability, so every
//! read candidate is probed with `PeekNamedPipe` for the number of bytes it
//! holds. Handlers then read at most that many bytes, which never blocks.
//!
//! The write side has no such probe: the free space of an anonymous pipe
//! cannot be queried, and `PIPE_NOWAIT` would turn an empty read into a
//! broken-pipe error. stdin therefore stays blocking, and a stdin chunk
//! (at most 1024 bytes) written while the pipe is full blocks the waiting
//! thread until the child reads. A child that stops reading stdin while its
//! own stdout pipe is full can deadlock against the waiter; feed such
//! children from a file instead of a stdin payload.

use std::io;
use std::ptr;
use std::time::Duration;

use windows_sys::Win32::Foundation::{GetLastError, ERROR_BROKEN_PIPE};
use windows_sys::Win32::System::Pipes::PeekNamedPipe;

use super::{Interest, RawPipe, Ready};

/// Sleep used when no timeout is given and nothing is ready yet
const IDLE_SLEEP: Duration = Duration::from_millis(50);

/// Bytes waiting in the pipe. A broken pipe reports `Some(0)`, which the read
/// handler turns into end-of-stream.
fn peek_available(handle: RawPipe) -> io::Result<Option<usize>> {
    let mut available: u32 = 0;
    // SAFETY: the handle is owned by a live ExecResult; no buffer is passed so
    // nothing is copied out of the pipe.
    let ok = unsafe {
        PeekNamedPipe(
            handle as windows_sys::Win32::Foundation::HANDLE,
            ptr::null_mut(),
            0,
            ptr::null_mut(),
            &mut available,
            ptr::null_mut(),
        )
    };
    if ok == 0 {
        // SAFETY: reads the calling thread's last-error value only.
        let code = unsafe { GetLastError() };
        if code == ERROR_BROKEN_PIPE {
            return Ok(Some(0));
        }
        return Err(io::Error::from_raw_os_error(code as i32));
    }
    Ok((available > 0).then_some(available as usize))
}

fn probe(reads: &[RawPipe], writes: &[RawPipe]) -> io::Result<Vec<Ready>> {
    let mut ready = Vec::new();
    for handle in reads {
        if let Some(available) = peek_available(*handle)? {
            ready.push(Ready {
                pipe: *handle,
                interest: Interest::Read,
                available: Some(available),
            });
        }
    }
    // Writes of at most one input chunk are treated as always possible.
    ready.extend(writes.iter().map(|handle| Ready {
        pipe: *handle,
        interest: Interest::Write,
        available: None,
    }));
    Ok(ready)
}

pub(super) fn poll_ready(
    reads: &[RawPipe],
    writes: &[RawPipe],
    timeout: Option<Duration>,
) -> io::Result<Vec<Ready>> {
    let ready = probe(reads, writes)?;
    if !ready.is_empty() {
        return Ok(ready);
    }
    std::thread::sleep(timeout.unwrap_or(IDLE_SLEEP));
    probe(reads, writes)
}

/// Anonymous pipes stay blocking; reads are bounded by the peeked byte count
/// and stdin writes may block (see the module docs).
pub(super) fn set_non_blocking(_handle: RawPipe) -> io::Result<()> {
    Ok(())
}

pub(super) fn is_blocking(_handle: RawPipe) -> io::Result<bool> {
    Ok(true)
}
