//! Best-effort non-blocking pipe I/O
//!
//! The I/O loop only invokes a handler once the platform reported the pipe as
//! ready, so a "would block" here is treated as spurious: the operation is
//! retried with a short linear backoff, and only repeated failures surface as
//! an error.

use std::io::{self, Read, Write};
use std::thread;
use std::time::Duration;

use crate::sys::{self, AsRawPipe};

/// Size of a single `read()` into the chunk buffer
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// How many times a would-block condition is retried before giving up
pub const MAX_WOULD_BLOCK_RETRIES: u32 = 8;

/// Base delay between would-block retries (grows linearly per attempt)
const RETRY_BACKOFF: Duration = Duration::from_millis(1);

/// Make a pipe end non-blocking. Idempotent.
///
/// # Errors
/// * Platform error if the handle is invalid
pub fn set_non_blocking<P: AsRawPipe + ?Sized>(pipe: &P) -> io::Result<()> {
    sys::set_non_blocking(pipe.as_raw_pipe())
}

/// Whether a pipe end is still in blocking mode
pub fn is_blocking<P: AsRawPipe + ?Sized>(pipe: &P) -> io::Result<bool> {
    sys::is_blocking(pipe.as_raw_pipe())
}

fn would_block_exhausted(op: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::WouldBlock,
        format!(
            "{} still would block after {} retries",
            op, MAX_WOULD_BLOCK_RETRIES
        ),
    )
}

fn backoff(attempt: u32) {
    thread::sleep(RETRY_BACKOFF * attempt);
}

/// Read what is currently available, up to `max` bytes (`None` = everything
/// available).
///
/// An empty result means the writer closed its end.
///
/// # Errors
/// * `WouldBlock` if nothing became readable after [`MAX_WOULD_BLOCK_RETRIES`]
/// * Any other read error from the pipe
pub fn read_chunk<R: Read + ?Sized>(reader: &mut R, max: Option<usize>) -> io::Result<Vec<u8>> {
    let mut chunk = Vec::new();
    let mut attempts = 0;

    loop {
        let want = match max {
            Some(max) => max.saturating_sub(chunk.len()),
            None => READ_BUFFER_SIZE,
        };
        if want == 0 {
            return Ok(chunk);
        }

        let start = chunk.len();
        chunk.resize(start + want.min(READ_BUFFER_SIZE), 0);

        match reader.read(&mut chunk[start..]) {
            Ok(0) => {
                chunk.truncate(start);
                return Ok(chunk);
            }
            Ok(n) => chunk.truncate(start + n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => chunk.truncate(start),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                chunk.truncate(start);
                if !chunk.is_empty() {
                    return Ok(chunk);
                }
                attempts += 1;
                if attempts > MAX_WOULD_BLOCK_RETRIES {
                    return Err(would_block_exhausted("read"));
                }
                tracing::trace!(attempts, "read would block, retrying");
                backoff(attempts);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Write as much of `bytes` as the pipe accepts right now.
///
/// Returns the number of bytes written so the caller can advance its cursor.
///
/// # Errors
/// * `WouldBlock` if the pipe stayed full after [`MAX_WOULD_BLOCK_RETRIES`]
/// * `BrokenPipe` if the reader is gone
pub fn write_chunk<W: Write + ?Sized>(writer: &mut W, bytes: &[u8]) -> io::Result<usize> {
    if bytes.is_empty() {
        return Ok(0);
    }

    let mut attempts = 0;
    loop {
        match writer.write(bytes) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                attempts += 1;
                if attempts > MAX_WOULD_BLOCK_RETRIES {
                    return Err(would_block_exhausted("write"));
                }
                tracing::trace!(attempts, "write would block, retrying");
                backoff(attempts);
            }
            Err(e) => return Err(e),
        }
    }
}
