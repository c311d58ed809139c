//! `poll(2)` based readiness

use std::io;
use std::os::fd::{BorrowedFd, RawFd};
use std::time::Duration;

use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

use super::{Interest, Ready};

fn read_events() -> PollFlags {
    PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR | PollFlags::POLLNVAL
}

fn write_events() -> PollFlags {
    PollFlags::POLLOUT | PollFlags::POLLHUP | PollFlags::POLLERR | PollFlags::POLLNVAL
}

/// Convert to a poll timeout in whole milliseconds, rounding up so a short
/// remaining window does not turn into a busy loop. A single call is capped at
/// `u16::MAX` milliseconds; callers loop on their own deadlines anyway.
fn poll_timeout(timeout: Option<Duration>) -> PollTimeout {
    match timeout {
        None => PollTimeout::NONE,
        Some(timeout) => {
            let millis = timeout.as_nanos().div_ceil(1_000_000);
            PollTimeout::from(u16::try_from(millis).unwrap_or(u16::MAX))
        }
    }
}

pub(super) fn poll_ready(
    reads: &[RawFd],
    writes: &[RawFd],
    timeout: Option<Duration>,
) -> io::Result<Vec<Ready>> {
    let interests = reads
        .iter()
        .map(|fd| (*fd, Interest::Read))
        .chain(writes.iter().map(|fd| (*fd, Interest::Write)))
        .collect::<Vec<_>>();

    // SAFETY: registered descriptors are owned by a live ExecResult and are only
    // closed by a handler after it has been popped from the registration table,
    // so every fd here stays open for the duration of this call.
    let mut fds = interests
        .iter()
        .map(|(fd, interest)| {
            let events = match interest {
                Interest::Read => PollFlags::POLLIN,
                Interest::Write => PollFlags::POLLOUT,
            };
            PollFd::new(unsafe { BorrowedFd::borrow_raw(*fd) }, events)
        })
        .collect::<Vec<_>>();

    match poll(&mut fds, poll_timeout(timeout)) {
        Ok(0) => return Ok(Vec::new()),
        Ok(_) => {}
        Err(Errno::EINTR) => {
            tracing::trace!("poll() interrupted, reporting nothing ready");
            return Ok(Vec::new());
        }
        Err(errno) => return Err(io::Error::from(errno)),
    }

    let ready = fds
        .iter()
        .zip(interests.iter())
        .filter_map(|(pollfd, (fd, interest))| {
            let revents = pollfd.revents()?;
            let wanted = match interest {
                Interest::Read => read_events(),
                Interest::Write => write_events(),
            };
            revents.intersects(wanted).then_some(Ready {
                pipe: *fd,
                interest: *interest,
                available: None,
            })
        })
        .collect();

    Ok(ready)
}

pub(super) fn set_non_blocking(fd: RawFd) -> io::Result<()> {
    let flags = OFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFL)?);
    if !flags.contains(OFlag::O_NONBLOCK) {
        fcntl(fd, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))?;
    }
    Ok(())
}

pub(super) fn is_blocking(fd: RawFd) -> io::Result<bool> {
    let flags = OFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFL)?);
    Ok(!flags.contains(OFlag::O_NONBLOCK))
}
